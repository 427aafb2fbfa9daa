//! Spending categories. The closed set plus the sentinel written when
//! classification fails.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Transaction categories. Labels are the persisted values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Food,
    Income,
    Health,
    Groceries,
    Education,
    Shopping,
    Transport,
    Investment,
    PeerTransfer,
    Phone,
    Housing,
    Other,
    /// Classification failed or returned something off-list.
    Unclassified,
}

impl Category {
    /// The closed set a classifier may answer with (sentinel excluded).
    pub const ALL: [Category; 12] = [
        Category::Food,
        Category::Income,
        Category::Health,
        Category::Groceries,
        Category::Education,
        Category::Shopping,
        Category::Transport,
        Category::Investment,
        Category::PeerTransfer,
        Category::Phone,
        Category::Housing,
        Category::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Food => "Alimentação",
            Category::Income => "Receitas",
            Category::Health => "Saúde",
            Category::Groceries => "Mercado",
            Category::Education => "Educação",
            Category::Shopping => "Compras",
            Category::Transport => "Transporte",
            Category::Investment => "Investimento",
            Category::PeerTransfer => "Transferências para terceiros",
            Category::Phone => "Telefone",
            Category::Housing => "Moradia",
            Category::Other => "Outros",
            Category::Unclassified => "Erro na Classificação",
        }
    }

    /// Exact label lookup, sentinel included.
    pub fn from_label(label: &str) -> Option<Category> {
        if label == Category::Unclassified.label() {
            return Some(Category::Unclassified);
        }
        Category::ALL.into_iter().find(|c| c.label() == label)
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, Category::Unclassified)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Category::from_label(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown category label: {s}")))
    }
}
