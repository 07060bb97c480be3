//! Stopword-based language tagging for extracted report text
//!
//! Classifies the opening of a document to an ISO-639-1 code so structured
//! extraction knows whether its queries need translation. Reports are mostly
//! English or a Nordic/Western-European language; anything unrecognized
//! falls back to "en".

/// How many characters of extracted text are sampled for detection
pub const DETECTION_SAMPLE_CHARS: usize = 1000;

const STOPWORDS: &[(&str, &[&str])] = &[
    (
        "en",
        &[
            "the", "and", "of", "to", "in", "is", "for", "with", "our", "are", "that", "from",
        ],
    ),
    (
        "sv",
        &[
            "och", "att", "det", "som", "för", "på", "av", "är", "med", "till", "våra", "från",
        ],
    ),
    (
        "de",
        &[
            "und", "der", "die", "das", "für", "mit", "von", "ist", "den", "auf", "wir", "nicht",
        ],
    ),
    (
        "fr",
        &[
            "les", "des", "est", "dans", "pour", "avec", "nous", "une", "sur", "par", "aux", "sont",
        ],
    ),
    (
        "es",
        &[
            "los", "las", "del", "para", "con", "una", "por", "nuestro", "son", "como", "más",
            "este",
        ],
    ),
    (
        "fi",
        &[
            "ja", "on", "että", "sekä", "vuoden", "olemme", "myös", "tämä", "kanssa", "mutta",
            "meidän", "ovat",
        ],
    ),
];

/// Detect the language of the first [`DETECTION_SAMPLE_CHARS`] characters
pub fn detect_language(text: &str) -> String {
    let sample: String = text.chars().take(DETECTION_SAMPLE_CHARS).collect();
    let sample = sample.to_lowercase();

    let words: Vec<&str> = sample
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return "en".to_string();
    }

    let mut best = ("en", 0usize);
    for (code, stopwords) in STOPWORDS {
        let hits = words.iter().filter(|w| stopwords.contains(w)).count();
        if hits > best.1 {
            best = (code, hits);
        }
    }
    best.0.to_string()
}
