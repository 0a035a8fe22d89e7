// src/names.rs - Collapse spelling variants of mudra names onto one key
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Maps a raw pose name from any source to its canonical spelling.
pub trait NameCanonicalizer: Send + Sync {
    fn canonical(&self, raw: &str) -> String;
}

/// Transliteration variants seen from the classifier labels and rule names,
/// keyed by the squashed lowercase form.
static ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    let groups: &[(&str, &[&str])] = &[
        ("Pataka", &["pataka", "pathaka", "patakam"]),
        ("Tripataka", &["tripataka", "tripathaka", "tripatakam"]),
        ("Ardhapataka", &["ardhapataka", "ardhapathaka", "ardhapatakam"]),
        ("Kartarimukha", &["kartarimukha", "kartarimukham", "kathrimukha", "katrimukha"]),
        ("Mayura", &["mayura", "mayuram", "mayoora"]),
        ("Ardhachandra", &["ardhachandra", "ardhachandran", "ardhachandram", "ardachandra"]),
        ("Arala", &["arala", "aralam"]),
        ("Shukatunda", &["shukatunda", "sukatunda", "shukatundam", "sukatundam"]),
        ("Musthi", &["musthi", "mushti", "mushthi", "mustthi", "mushtti", "mushtih"]),
        ("Shikhara", &["shikhara", "sikhara", "shikaram", "shikharam", "sikharam"]),
        ("Kapitta", &["kapitta", "kapittha", "kapittham", "kapitham"]),
        ("Katakamukha", &["katakamukha", "katakamukham"]),
        ("Suchi", &["suchi", "soochi", "suchee", "suci"]),
        ("Chandrakala", &["chandrakala", "chandrakalaa", "candrakala"]),
        ("Padmakosha", &["padmakosha", "padmakosa", "padmakosham"]),
        ("Alapadma", &["alapadma", "alapadmam", "alapallava"]),
        ("Mrigashirsha", &["mrigashirsha", "mrigasirsha", "mrigasheersha", "mrigashirsham"]),
        ("Simhamukha", &["simhamukha", "simhamukham", "simhamuka"]),
        ("Trishula", &["trishula", "trisula", "trishulam", "trisulam"]),
        ("Hamsasya", &["hamsasya", "hamsasyam", "hansasya"]),
        ("Mukula", &["mukula", "mukulam"]),
        ("Sarpashirsha", &["sarpashirsha", "sarpasirsha", "sarpashirsham"]),
        ("Kangula", &["kangula", "kangulam", "langula"]),
        ("Chatura", &["chatura", "chaturam"]),
        ("Bhramara", &["bhramara", "bhramaram", "brahmara"]),
        ("Hamsapaksha", &["hamsapaksha", "hamsapaksham"]),
        ("Sandamsha", &["sandamsha", "samdamsha", "sandamsham"]),
        ("Tamrachuda", &["tamrachuda", "tamrachudam"]),
    ];
    for (canonical, variants) in groups {
        for v in *variants {
            m.insert(*v, *canonical);
        }
    }
    m
});

const SUFFIXES: [&str; 3] = ["hastam", "hasta", "mudra"];

/// Default canonicalizer: case, punctuation and suffix insensitive, with a
/// transliteration alias table. Unknown names come back title-cased so that
/// both evidence sources still agree on them.
#[derive(Debug, Clone, Copy, Default)]
pub struct MudraNames;

impl MudraNames {
    fn squash(raw: &str) -> String {
        let mut key: String = raw
            .chars()
            .filter(|c| c.is_alphabetic())
            .flat_map(|c| c.to_lowercase())
            .collect();
        for suffix in SUFFIXES {
            if key.len() > suffix.len() && key.ends_with(suffix) {
                key.truncate(key.len() - suffix.len());
                break;
            }
        }
        key
    }
}

impl NameCanonicalizer for MudraNames {
    fn canonical(&self, raw: &str) -> String {
        let key = Self::squash(raw);
        if let Some(name) = ALIASES.get(key.as_str()) {
            return (*name).to_string();
        }
        let mut chars = key.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}
