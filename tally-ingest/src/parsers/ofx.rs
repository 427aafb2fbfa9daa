//! OFX statement parser (SGML 1.x and XML 2.x)
//!
//! Expected SGML layout:
//!   OFXHEADER:100
//!   DATA:OFXSGML
//!   ENCODING:USASCII
//!   <OFX>
//!     <BANKMSGSRSV1><STMTTRNRS><STMTRS>
//!       <BANKACCTFROM><ACCTID>12345-6</BANKACCTFROM>
//!       <BANKTRANLIST>
//!         <STMTTRN><TRNTYPE>DEBIT<DTPOSTED>20240503120000[-3:BRT]<TRNAMT>-42.90<FITID>0001<MEMO>IFD*PADARIA
//!         </STMTTRN>
//!
//! SGML leaves are usually left unclosed; XML closes every element. The tree
//! builder accepts both.

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

use tally_core::Transaction;

use crate::types::{OfxAccount, OfxDocument, OfxStatement, OfxTransaction, StatementKind};

/// Header token some exporters emit with stray whitespace.
const MALFORMED_ENCODING: &str = "ENCODING: UTF - 8";

#[derive(Debug, Error)]
pub enum OfxError {
    #[error("malformed OFX header: {0:?}")]
    BadHeader(String),
    #[error("missing <OFX> root element")]
    MissingRoot,
    #[error("closing tag </{0}> has no matching opening tag")]
    Unbalanced(String),
    #[error("transaction is missing <{0}>")]
    MissingField(&'static str),
    #[error("invalid date {0:?}")]
    BadDate(String),
    #[error("invalid amount {0:?}")]
    BadAmount(String),
    #[error(transparent)]
    Regex(#[from] regex::Error),
}

/// ISO-8859-1: every byte is the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

pub fn repair_header(text: &str) -> String {
    text.replace(MALFORMED_ENCODING, "ENCODING:UTF-8")
}

/// Repair, parse and coerce one statement into transactions.
pub fn parse_statement(text: &str) -> Result<Vec<Transaction>, OfxError> {
    let doc = parse_ofx(&repair_header(text))?;
    extract_transactions(&doc)
}

/// Structural parse. Header lines are `KEY:VALUE`, whitespace around either
/// side allowed; the header ends at the first blank line.
pub fn parse_ofx(text: &str) -> Result<OfxDocument, OfxError> {
    let body = split_header(text)?;
    let root = build_tree(body)?;

    let mut accounts = Vec::new();
    for (tag, from_tag, kind) in [
        ("STMTRS", "BANKACCTFROM", StatementKind::BankAccount),
        ("CCSTMTRS", "CCACCTFROM", StatementKind::CreditCard),
    ] {
        let mut found = Vec::new();
        root.descendants(tag, &mut found);
        for rs in found {
            accounts.push(read_account(rs, from_tag, kind)?);
        }
    }

    Ok(OfxDocument { accounts })
}

/// Every transaction of every account's statement, coerced.
pub fn extract_transactions(doc: &OfxDocument) -> Result<Vec<Transaction>, OfxError> {
    let mut out = Vec::new();
    for account in &doc.accounts {
        if let Some(statement) = &account.statement {
            for t in &statement.transactions {
                out.push(coerce_transaction(t)?);
            }
        }
    }
    Ok(out)
}

pub fn coerce_transaction(t: &OfxTransaction) -> Result<Transaction, OfxError> {
    let description = [&t.memo, &t.name]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .cloned()
        .unwrap_or_default();

    Ok(Transaction::new(
        parse_ofx_date(&t.posted)?,
        parse_amount(&t.amount)?,
        description,
        t.fit_id.clone().unwrap_or_default(),
    ))
}

/// `YYYYMMDD[HHMMSS[.XXX]][[offset:TZ]]` -> date; everything after the day is dropped.
fn parse_ofx_date(s: &str) -> Result<NaiveDate, OfxError> {
    let s = s.trim();
    let ymd = s
        .get(..8)
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| OfxError::BadDate(s.to_string()))?;
    NaiveDate::parse_from_str(ymd, "%Y%m%d").map_err(|_| OfxError::BadDate(s.to_string()))
}

fn parse_amount(s: &str) -> Result<f64, OfxError> {
    let s = s.trim();
    let normalized = if s.contains(',') && !s.contains('.') {
        s.replace(',', ".")
    } else {
        s.to_string()
    };
    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| OfxError::BadAmount(s.to_string()))
}

fn split_header(text: &str) -> Result<&str, OfxError> {
    let text = text.trim_start_matches('\u{feff}').trim_start();
    let root = text.find("<OFX>").ok_or(OfxError::MissingRoot)?;

    // XML dialect: only processing instructions precede the root.
    if text.starts_with('<') {
        return Ok(&text[root..]);
    }

    let key_re = Regex::new(r"^[A-Z0-9]+$")?;
    let mut has_version = false;
    for line in text[..root].lines().map(str::trim) {
        if line.is_empty() {
            break;
        }
        let (key, value) = line
            .split_once(':')
            .map(|(k, v)| (k.trim(), v.trim()))
            .ok_or_else(|| OfxError::BadHeader(line.to_string()))?;
        // `ENCODING: UTF - 8` survives the trim; repair_header rewrites it
        if !key_re.is_match(key) || value.contains(char::is_whitespace) {
            return Err(OfxError::BadHeader(line.to_string()));
        }
        if key == "OFXHEADER" {
            has_version = true;
        }
    }
    if !has_version {
        return Err(OfxError::BadHeader("missing OFXHEADER".to_string()));
    }

    Ok(&text[root..])
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    text: Option<String>,
    children: Vec<Element>,
}

impl Element {
    fn named(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn text_of(&self, name: &str) -> Option<String> {
        self.child(name).and_then(|c| c.text.clone())
    }

    fn descendants<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for c in &self.children {
            if c.name == name {
                out.push(c);
            }
            c.descendants(name, out);
        }
    }
}

fn build_tree(body: &str) -> Result<Element, OfxError> {
    let tag_re = Regex::new(r"<(/?)([A-Za-z0-9_.]+)[^>]*>([^<]*)")?;

    // stack[0] is a synthetic document node
    let mut stack = vec![Element::default()];

    for caps in tag_re.captures_iter(body) {
        let name = caps[2].to_ascii_uppercase();
        if !caps[1].is_empty() {
            close_element(&mut stack, &name)?;
            continue;
        }

        let text = caps[3].trim();
        if text.is_empty() {
            stack.push(Element::named(name));
        } else if let Some(top) = stack.last_mut() {
            top.children.push(Element {
                name,
                text: Some(unescape(text)),
                children: Vec::new(),
            });
        }
    }

    while stack.len() > 1 {
        fold_implicit(&mut stack);
    }

    stack
        .pop()
        .and_then(|doc| doc.children.into_iter().find(|e| e.name == "OFX"))
        .ok_or(OfxError::MissingRoot)
}

fn close_element(stack: &mut Vec<Element>, name: &str) -> Result<(), OfxError> {
    // `</TRNAMT>` after a leaf that already holds its text
    let closes_leaf = stack
        .last()
        .and_then(|top| top.children.last())
        .is_some_and(|c| c.name == name && c.text.is_some());
    if closes_leaf {
        return Ok(());
    }

    if !stack.iter().skip(1).any(|e| e.name == name) {
        return Err(OfxError::Unbalanced(name.to_string()));
    }

    while stack.last().is_some_and(|top| top.name != name) {
        fold_implicit(stack);
    }
    if let Some(done) = stack.pop() {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(done);
        }
    }
    Ok(())
}

/// Pop an element whose closing tag never came. An unclosed element is an
/// empty SGML leaf, so whatever was nested under it belongs to its parent.
fn fold_implicit(stack: &mut Vec<Element>) {
    let Some(mut open) = stack.pop() else {
        return;
    };
    let Some(parent) = stack.last_mut() else {
        stack.push(open);
        return;
    };
    let adopted = std::mem::take(&mut open.children);
    parent.children.push(open);
    parent.children.extend(adopted);
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn read_account(rs: &Element, from_tag: &str, kind: StatementKind) -> Result<OfxAccount, OfxError> {
    let account_id = rs
        .child(from_tag)
        .and_then(|from| from.text_of("ACCTID"))
        .unwrap_or_default();

    let statement = match rs.child("BANKTRANLIST") {
        Some(list) => {
            let mut transactions = Vec::new();
            for t in list.children.iter().filter(|c| c.name == "STMTTRN") {
                transactions.push(read_transaction(t)?);
            }
            Some(OfxStatement {
                currency: rs.text_of("CURDEF"),
                transactions,
            })
        }
        None => None,
    };

    Ok(OfxAccount {
        account_id,
        kind,
        statement,
    })
}

fn read_transaction(t: &Element) -> Result<OfxTransaction, OfxError> {
    Ok(OfxTransaction {
        trn_type: t.text_of("TRNTYPE"),
        posted: t
            .text_of("DTPOSTED")
            .ok_or(OfxError::MissingField("DTPOSTED"))?,
        amount: t
            .text_of("TRNAMT")
            .ok_or(OfxError::MissingField("TRNAMT"))?,
        fit_id: t.text_of("FITID"),
        memo: t.text_of("MEMO"),
        name: t.text_of("NAME"),
    })
}
