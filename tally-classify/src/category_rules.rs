//! Deterministic merchant-token rules.
//!
//! Whole-word tokens decide the category before any model is consulted:
//! food-delivery markers beat everything (an `IFD*` prefix is followed by the
//! restaurant owner's name), then ride-hailing markers. Tokens only match at
//! word boundaries, so city names like UBERLANDIA or UBERABA are left alone.

use regex::Regex;
use std::sync::OnceLock;

use tally_core::Category;

const FOOD_DELIVERY_PATTERN: &str = r"\b(IFD|IFOOD|RAPPI|UBER\s+EATS)\b";
const RIDE_PATTERN: &str = r"\b(UBER|99APP)\b";

static FOOD_DELIVERY_RE: OnceLock<Option<Regex>> = OnceLock::new();
static RIDE_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn token_match(cell: &'static OnceLock<Option<Regex>>, pattern: &str, text: &str) -> bool {
    cell.get_or_init(|| match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            log::error!("merchant rule {pattern:?} disabled: {e}");
            None
        }
    })
    .as_ref()
    .is_some_and(|re| re.is_match(text))
}

/// Words that never appear in a bare personal name.
const BANKING_KEYWORDS: &[&str] = &[
    "PIX", "TED", "DOC", "PAGAMENTO", "PAGTO", "PGTO", "SALARIO", "COMPRA", "TARIFA", "SAQUE",
    "TRANSFERENCIA", "DEPOSITO", "BOLETO", "FATURA", "CARTAO", "DEBITO", "CREDITO", "JUROS",
    "IOF", "RENDIMENTO", "RENDIMENTOS", "APLICACAO", "RESGATE", "ESTORNO", "MERCADO",
    "SUPERMERCADO", "FARMACIA", "DROGARIA", "POSTO", "LTDA", "EIRELI", "CIA", "LOJA", "LOJAS",
    "RESTAURANTE", "PADARIA", "CLUB", "CLUBE", "SHOPPING", "ESCOLA", "COLEGIO", "FACULDADE",
    "ALUGUEL", "CONDOMINIO", "ENERGIA", "AGUA", "TELEFONE", "INTERNET", "SEGURO", "ANUIDADE",
];

/// Category forced by a merchant token, if any.
pub fn match_merchant_rules(description: &str) -> Option<Category> {
    let desc = description.to_uppercase();

    if token_match(&FOOD_DELIVERY_RE, FOOD_DELIVERY_PATTERN, &desc) {
        return Some(Category::Food);
    }

    if token_match(&RIDE_RE, RIDE_PATTERN, &desc) {
        return Some(Category::Transport);
    }

    None
}

/// Two to six purely alphabetic words, none of them a banking keyword.
pub fn looks_like_person_name(description: &str) -> bool {
    let desc = description.to_uppercase();
    let words: Vec<&str> = desc.split_whitespace().collect();
    if !(2..=6).contains(&words.len()) {
        return false;
    }
    words.iter().all(|w| {
        w.chars().all(char::is_alphabetic) && !BANKING_KEYWORDS.contains(w)
    })
}

/// Offline classification: merchant rules, then the bare-name rule, else `Outros`.
pub fn classify_offline(description: &str) -> Category {
    if let Some(c) = match_merchant_rules(description) {
        return c;
    }
    if looks_like_person_name(description) {
        return Category::PeerTransfer;
    }
    Category::Other
}
