use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use tally_classify::{classify_table, CategoryClassifier, ClassifyError, ClassifyMode, TextGenerator};
use tally_core::{
    apply_filter, category_breakdown, read_classified, write_classified, Category, FilterOptions,
    Metrics, PeriodKey,
};
use tally_ingest::{ingest_dir, FileStatus};

/// Answers by keyword, and fails outright for anything mentioning NETFLIX.
struct KeywordModel;

impl TextGenerator for KeywordModel {
    fn generate(&mut self, prompt: &str) -> Result<String, ClassifyError> {
        let input = prompt
            .rsplit("Entrada: ")
            .next()
            .unwrap_or_default()
            .to_string();
        if input.contains("NETFLIX") {
            return Err(ClassifyError::Request("503 Service Unavailable".into()));
        }
        if input.contains("SALARIO") {
            return Ok("Receitas".into());
        }
        if input.contains("ALUGUEL") {
            return Ok("Moradia\n".into());
        }
        Ok("I think this is shopping".into())
    }
}

fn ofx(transactions: &[(&str, &str, &str, &str)]) -> String {
    let mut body = String::new();
    for (fitid, date, amount, memo) in transactions {
        body.push_str(&format!(
            "<STMTTRN>\n<TRNTYPE>OTHER\n<DTPOSTED>{date}100000[-3:BRT]\n<TRNAMT>{amount}\n<FITID>{fitid}\n<MEMO>{memo}\n</STMTTRN>\n"
        ));
    }
    format!(
        "OFXHEADER:100\nDATA:OFXSGML\nVERSION:102\nENCODING: UTF - 8\nCHARSET:1252\n\n\
<OFX>\n<BANKMSGSRSV1>\n<STMTTRNRS>\n<STMTRS>\n<CURDEF>BRL\n<BANKACCTFROM>\n<ACCTID>777\n</BANKACCTFROM>\n\
<BANKTRANLIST>\n{body}</BANKTRANLIST>\n</STMTRS>\n</STMTTRNRS>\n</BANKMSGSRSV1>\n</OFX>\n"
    )
}

fn workspace(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tally-it-{}-{}", std::process::id(), name));
    fs::remove_dir_all(&dir).ok();
    fs::create_dir_all(dir.join("extratos")).unwrap();
    dir
}

/// Valid, malformed, valid: the malformed file drops out and the batch finishes.
#[test]
fn test_batch_skips_malformed_file() {
    let dir = workspace("batch");
    let src = dir.join("extratos");
    fs::write(
        src.join("a.ofx"),
        ofx(&[
            ("a1", "20240502", "5000.00", "PAGAMENTO DE SALARIO"),
            ("a2", "20240503", "-42.90", "IFD*BRUNO MARQUES RODR"),
        ]),
    )
    .unwrap();
    fs::write(
        src.join("b.ofx"),
        ofx(&[("b1", "2024-05-04", "-1.00", "BROKEN DATE")]),
    )
    .unwrap();
    fs::write(
        src.join("c.ofx"),
        ofx(&[
            ("c1", "20240410", "-1500.00", "ALUGUEL ABRIL"),
            ("c2", "20240511", "-39.90", "NETFLIX.COM"),
        ]),
    )
    .unwrap();
    fs::write(src.join("readme.txt"), "not a statement").unwrap();

    let report = ingest_dir(&src).unwrap();
    let ids: Vec<_> = report
        .table
        .records()
        .iter()
        .map(|t| t.external_id.as_str())
        .collect();
    assert_eq!(ids, vec!["a1", "a2", "c1", "c2"]);
    assert_eq!(report.files.len(), 3);
    assert!(matches!(report.files[1], FileStatus::Failed { .. }));

    // date truncated, sign preserved
    let a2 = &report.table.records()[1];
    assert_eq!(a2.date, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
    assert_eq!(a2.amount, -42.90);

    fs::remove_dir_all(&dir).ok();
}

/// Ingest -> classify -> persist -> reload -> summarize.
#[test]
fn test_end_to_end_summary() {
    let dir = workspace("e2e");
    let src = dir.join("extratos");
    fs::write(
        src.join("maio.ofx"),
        ofx(&[
            ("1", "20240502", "5000.00", "PAGAMENTO DE SALARIO"),
            ("2", "20240503", "-42.90", "IFD*BRUNO MARQUES RODR"),
            ("3", "20240507", "-18.10", "UBER *VIAGEM"),
            ("4", "20240511", "-39.90", "NETFLIX.COM"),
            ("5", "20240520", "-120.00", "LOJA DE ROUPAS"),
            ("6", "20240410", "-1500.00", "ALUGUEL ABRIL"),
        ]),
    )
    .unwrap();

    let report = ingest_dir(&src).unwrap();
    let mut classifier = CategoryClassifier::new(ClassifyMode::RulesFirst, Box::new(KeywordModel));
    let outcome = classify_table(&report.table, &mut classifier, |_| {});
    assert_eq!(outcome.rows.len(), 6);
    // NETFLIX errored, the shopping reply was off-list
    assert_eq!(outcome.failures, 2);

    let out = dir.join("extrato_classificado.csv");
    write_classified(&out, &outcome.rows).unwrap();
    let loaded = read_classified(&out).unwrap();
    assert_eq!(loaded, outcome.rows);

    for r in &loaded {
        assert!(Category::ALL.contains(&r.category) || r.category.is_sentinel());
    }

    let opts = FilterOptions::derive(&loaded);
    let may: PeriodKey = "2024-05".parse().unwrap();
    assert_eq!(opts.latest_period(), Some(may));

    let filtered = apply_filter(&loaded, may, &opts.all_categories());
    assert_eq!(filtered.len(), 5);

    let m = Metrics::compute(&filtered);
    assert_eq!(m.inflow, 5000.0);
    assert_eq!(m.inflow + m.outflow, m.net);
    assert!((m.outflow - -220.9).abs() < 1e-9);

    let slices = category_breakdown(&filtered);
    assert_eq!(slices[0].category, Category::Unclassified);
    assert!((slices[0].total - 159.9).abs() < 1e-9);
    let spent: f64 = slices.iter().map(|s| s.total).sum();
    assert!((spent - m.outflow.abs()).abs() < 1e-9);

    let food_only: BTreeSet<_> = [Category::Food].into_iter().collect();
    let food = apply_filter(&loaded, may, &food_only);
    assert_eq!(food.len(), 1);
    assert_eq!(food[0].description(), "IFD*BRUNO MARQUES RODR");

    fs::remove_dir_all(&dir).ok();
}
