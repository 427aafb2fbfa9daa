use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    CreditCard,
    BankAccount,
}

/// Structural view of one OFX file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfxDocument {
    pub accounts: Vec<OfxAccount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfxAccount {
    pub account_id: String,
    pub kind: StatementKind,
    /// Absent when the account block carries no transaction list
    pub statement: Option<OfxStatement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfxStatement {
    pub currency: Option<String>,
    pub transactions: Vec<OfxTransaction>,
}

/// Raw transaction fields as they appear in the file, before coercion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfxTransaction {
    pub trn_type: Option<String>,
    /// `DTPOSTED`, e.g. `20240503120000[-3:BRT]`
    pub posted: String,
    /// `TRNAMT`, e.g. `-42.90`
    pub amount: String,
    pub fit_id: Option<String>,
    pub memo: Option<String>,
    pub name: Option<String>,
}
