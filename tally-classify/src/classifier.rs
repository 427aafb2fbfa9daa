//! The classification pass: one synchronous generator call per transaction,
//! in table order, with the sentinel substituted on any failure.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use tally_core::{Category, ClassifiedTransaction, TransactionTable};

use crate::category_rules::{classify_offline, match_merchant_rules};
use crate::prompt::render_prompt;
use crate::validate::validate_response;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("empty response")]
    Empty,
    #[error("response is not a category: {0:?}")]
    OffList(String),
}

/// External text-generation capability: prompt in, short reply out.
pub trait TextGenerator {
    fn generate(&mut self, prompt: &str) -> Result<String, ClassifyError>;
}

/// How merchant rules and the generator combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifyMode {
    /// Merchant-token rules win; everything else goes to the generator
    #[default]
    RulesFirst,
    /// Every description goes to the generator
    Model,
    /// No generator: merchant rules, bare-name rule, else `Outros`
    RulesOnly,
}

impl ClassifyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifyMode::RulesFirst => "rules-first",
            ClassifyMode::Model => "model",
            ClassifyMode::RulesOnly => "rules-only",
        }
    }

    pub fn needs_generator(&self) -> bool {
        !matches!(self, ClassifyMode::RulesOnly)
    }
}

impl fmt::Display for ClassifyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassifyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "rules-first" => Ok(ClassifyMode::RulesFirst),
            "model" => Ok(ClassifyMode::Model),
            "rules-only" => Ok(ClassifyMode::RulesOnly),
            other => Err(format!(
                "unknown mode {other:?} (expected rules-first, model or rules-only)"
            )),
        }
    }
}

/// Rules + generator + validator behind `classify(text)`.
pub struct CategoryClassifier {
    mode: ClassifyMode,
    generator: Option<Box<dyn TextGenerator>>,
}

impl CategoryClassifier {
    pub fn new(mode: ClassifyMode, generator: Box<dyn TextGenerator>) -> Self {
        Self {
            mode,
            generator: Some(generator),
        }
    }

    pub fn offline() -> Self {
        Self {
            mode: ClassifyMode::RulesOnly,
            generator: None,
        }
    }

    pub fn mode(&self) -> ClassifyMode {
        self.mode
    }

    /// Without a generator every mode falls back to the offline rules.
    pub fn try_classify(&mut self, description: &str) -> Result<Category, ClassifyError> {
        match (self.mode, self.generator.as_mut()) {
            (ClassifyMode::RulesOnly, _) | (_, None) => Ok(classify_offline(description)),
            (ClassifyMode::RulesFirst, Some(generator)) => match match_merchant_rules(description) {
                Some(c) => Ok(c),
                None => ask_generator(&mut **generator, description),
            },
            (ClassifyMode::Model, Some(generator)) => ask_generator(&mut **generator, description),
        }
    }

    /// Never fails: any error becomes the sentinel.
    pub fn classify(&mut self, description: &str) -> Category {
        self.try_classify(description)
            .unwrap_or(Category::Unclassified)
    }
}

fn ask_generator(
    generator: &mut dyn TextGenerator,
    description: &str,
) -> Result<Category, ClassifyError> {
    let raw = generator.generate(&render_prompt(description))?;
    validate_response(&raw)
}

/// Progress tick emitted before each call
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    /// 1-based
    pub index: usize,
    pub total: usize,
    pub description: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct ClassificationOutcome {
    pub rows: Vec<ClassifiedTransaction>,
    pub failures: usize,
}

/// Classify every transaction in order and attach the categories positionally.
pub fn classify_table(
    table: &TransactionTable,
    classifier: &mut CategoryClassifier,
    mut on_progress: impl FnMut(Progress<'_>),
) -> ClassificationOutcome {
    let total = table.len();
    let mut categories = Vec::with_capacity(total);
    let mut failures = 0;

    for (i, description) in table.descriptions().enumerate() {
        on_progress(Progress {
            index: i + 1,
            total,
            description,
        });

        let category = match classifier.try_classify(description) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("could not classify {description:?}: {e}");
                failures += 1;
                Category::Unclassified
            }
        };
        categories.push(category);
    }

    let rows = table
        .records()
        .iter()
        .cloned()
        .zip(categories)
        .map(|(t, c)| ClassifiedTransaction::new(t, c))
        .collect();

    ClassificationOutcome { rows, failures }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use tally_core::Transaction;

    /// Replays canned replies and records every prompt it saw.
    struct Scripted {
        replies: VecDeque<Result<String, ClassifyError>>,
        prompts: Rc<RefCell<Vec<String>>>,
    }

    impl TextGenerator for Scripted {
        fn generate(&mut self, prompt: &str) -> Result<String, ClassifyError> {
            self.prompts.borrow_mut().push(prompt.to_string());
            self.replies
                .pop_front()
                .unwrap_or_else(|| Err(ClassifyError::Request("script exhausted".into())))
        }
    }

    fn scripted(
        replies: Vec<Result<&str, ClassifyError>>,
    ) -> (Box<dyn TextGenerator>, Rc<RefCell<Vec<String>>>) {
        let prompts = Rc::new(RefCell::new(Vec::new()));
        let generator = Scripted {
            replies: replies.into_iter().map(|r| r.map(str::to_string)).collect(),
            prompts: Rc::clone(&prompts),
        };
        (Box::new(generator), prompts)
    }

    fn table(descriptions: &[&str]) -> TransactionTable {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        descriptions
            .iter()
            .enumerate()
            .map(|(i, d)| Transaction::new(date, -1.0 - i as f64, *d, i.to_string()))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("rules-first".parse::<ClassifyMode>(), Ok(ClassifyMode::RulesFirst));
        assert_eq!("model".parse::<ClassifyMode>(), Ok(ClassifyMode::Model));
        assert_eq!("rules-only".parse::<ClassifyMode>(), Ok(ClassifyMode::RulesOnly));
        assert!("llm".parse::<ClassifyMode>().is_err());
        assert!(!ClassifyMode::RulesOnly.needs_generator());
    }

    #[test]
    fn test_failures_become_sentinel_and_loop_continues() {
        let (generator, prompts) = scripted(vec![
            Ok("Receitas"),
            Err(ClassifyError::Request("timeout".into())),
            Ok("Sure! The category is Moradia."),
            Ok("  Moradia "),
        ]);
        let mut classifier = CategoryClassifier::new(ClassifyMode::Model, generator);
        let t = table(&["PAGAMENTO DE SALARIO", "NETFLIX", "ALUGUEL", "CONDOMINIO"]);

        let mut ticks = Vec::new();
        let out = classify_table(&t, &mut classifier, |p| ticks.push((p.index, p.total)));

        let cats: Vec<_> = out.rows.iter().map(|r| r.category).collect();
        assert_eq!(
            cats,
            vec![
                Category::Income,
                Category::Unclassified,
                Category::Unclassified,
                Category::Housing
            ]
        );
        assert_eq!(out.failures, 2);
        assert_eq!(ticks, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
        assert_eq!(prompts.borrow().len(), 4);
        assert!(prompts.borrow()[0].ends_with("Entrada: PAGAMENTO DE SALARIO\nSaída:"));
    }

    #[test]
    fn test_rows_aligned_with_table() {
        let (generator, _) = scripted(vec![Ok("Outros"), Ok("Saúde")]);
        let mut classifier = CategoryClassifier::new(ClassifyMode::Model, generator);
        let t = table(&["A", "B"]);
        let out = classify_table(&t, &mut classifier, |_| {});
        assert_eq!(out.rows[0].transaction, t.records()[0]);
        assert_eq!(out.rows[1].transaction, t.records()[1]);
        assert_eq!(out.rows[1].category, Category::Health);
    }

    #[test]
    fn test_rules_first_skips_generator_for_merchant_tokens() {
        let (generator, prompts) = scripted(vec![Ok("Educação")]);
        let mut classifier = CategoryClassifier::new(ClassifyMode::RulesFirst, generator);

        assert_eq!(classifier.classify("IFD*BRUNO MARQUES RODR"), Category::Food);
        assert_eq!(classifier.classify("UBER *VIAGEM"), Category::Transport);
        assert!(prompts.borrow().is_empty());

        assert_eq!(classifier.classify("COLEGIO SAO BENTO"), Category::Education);
        assert_eq!(prompts.borrow().len(), 1);
    }

    #[test]
    fn test_model_mode_asks_even_for_merchant_tokens() {
        let (generator, prompts) = scripted(vec![Ok("Alimentação")]);
        let mut classifier = CategoryClassifier::new(ClassifyMode::Model, generator);
        assert_eq!(classifier.classify("IFOOD CLUB"), Category::Food);
        assert_eq!(prompts.borrow().len(), 1);
    }

    #[test]
    fn test_empty_reply_is_error() {
        let (generator, _) = scripted(vec![Ok("   ")]);
        let mut classifier = CategoryClassifier::new(ClassifyMode::Model, generator);
        assert!(matches!(classifier.try_classify("X"), Err(ClassifyError::Empty)));
    }

    #[test]
    fn test_offline_classifier() {
        let mut classifier = CategoryClassifier::offline();
        assert_eq!(classifier.mode(), ClassifyMode::RulesOnly);
        assert_eq!(classifier.classify("RAUL BURIM DE CARVALHO"), Category::PeerTransfer);
        assert_eq!(classifier.classify("TARIFA 123"), Category::Other);
    }

    #[test]
    fn test_empty_table() {
        let mut classifier = CategoryClassifier::offline();
        let out = classify_table(&TransactionTable::default(), &mut classifier, |_| {
            panic!("no progress expected")
        });
        assert!(out.rows.is_empty());
        assert_eq!(out.failures, 0);
    }
}
