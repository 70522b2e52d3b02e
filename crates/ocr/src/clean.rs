use std::sync::OnceLock;

use regex::Regex;

/// Mis-decoded byte sequences left behind by byte-level BPE tokenizers,
/// applied in order.
const REPLACEMENTS: &[(&str, &str)] = &[
    ("Ã©", "é"),
    ("Ã¨", "è"),
    ("Ã¡", "á"),
    ("Ã\u{AD}", "í"),
    ("Ã³", "ó"),
    ("Ãº", "ú"),
    ("Ã¼", "ü"),
    ("Ã‰", "É"),
    ("Ã€", "È"),
    ("Ã\u{81}", "Á"),
    ("Ã\u{8D}", "Í"),
    ("Ã“", "Ó"),
    ("Ãš", "Ú"),
    ("Ãœ", "Ü"),
    ("Ã±", "ñ"),
    ("Ã‘", "Ñ"),
    ("Âº", "º"),
    ("Âª", "ª"),
    ("âĢĶ", "-"),
    ("âĤ¬", "€"),
];

fn re_dash_run() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"-[-=]+-").expect("invalid regex"))
}

fn re_whitespace() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\s+").expect("invalid regex"))
}

/// Repair encoding artifacts and normalize whitespace in a word candidate.
pub fn clean_text(text: &str) -> String {
    let mut out = text.to_string();
    for (bad, good) in REPLACEMENTS {
        if out.contains(bad) {
            out = out.replace(bad, good);
        }
    }
    let out = re_dash_run().replace_all(&out, "-");
    let out = re_whitespace().replace_all(&out, " ");
    out.trim().to_string()
}
