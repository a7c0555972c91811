use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Languages with a built-in stop-word list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Es,
    Fr,
    It,
    De,
    Pt,
}

impl Language {
    pub const ALL: &'static [Language] =
        &[Language::En, Language::Es, Language::Fr, Language::It, Language::De, Language::Pt];

    pub fn stopwords(self) -> &'static [&'static str] {
        match self {
            Language::En => EN,
            Language::Es => ES,
            Language::Fr => FR,
            Language::It => IT,
            Language::De => DE,
            Language::Pt => PT,
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "es" | "spanish" => Ok(Language::Es),
            "fr" | "french" => Ok(Language::Fr),
            "it" | "italian" => Ok(Language::It),
            "de" | "german" => Ok(Language::De),
            "pt" | "portuguese" => Ok(Language::Pt),
            other => Err(format!("unsupported language '{other}'")),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Language::En => "en",
            Language::Es => "es",
            Language::Fr => "fr",
            Language::It => "it",
            Language::De => "de",
            Language::Pt => "pt",
        };
        f.write_str(code)
    }
}

const EN: &[&str] = &[
    "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
    "be","because","been","before","being","below","between","both","but","by",
    "can","cannot","could","did","do","does","doing","down","during",
    "each","few","for","from","further","had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
    "i","if","in","into","is","it","its","itself","me","more","most","my","myself",
    "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
    "same","she","should","so","some","such","than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
    "under","until","up","very","was","we","were","what","when","where","which","while","who","whom","why","with","would",
    "you","your","yours","yourself","yourselves",
];

const ES: &[&str] = &[
    "al","algo","algunas","algunos","ante","antes","como","con","contra","cual","cuando","de","del","desde","donde","durante",
    "e","el","ella","ellas","ellos","en","entre","era","esa","esas","ese","eso","esos","esta","estas","este","esto","estos","fue","fueron",
    "ha","hay","la","las","le","les","lo","los","mas","me","mi","mis","mucho","muy","nada","ni","nos","nosotros","o","os","otra","otro",
    "para","pero","poco","por","porque","que","quien","se","sea","ser","si","sin","sobre","su","sus","también","te","tu","tus",
    "un","una","uno","unos","y","ya","yo",
];

const FR: &[&str] = &[
    "au","aux","avec","ce","ces","cette","dans","de","des","du","elle","elles","en","est","et","eux","il","ils","je","la","le","les","leur","leurs",
    "lui","ma","mais","me","mes","moi","mon","ne","nos","notre","nous","on","ou","où","par","pas","pour","qu","que","qui","sa","se","ses",
    "son","sur","ta","te","tes","toi","ton","tu","un","une","vos","votre","vous","été","être",
];

const IT: &[&str] = &[
    "ad","al","alla","alle","allo","anche","che","chi","ci","col","con","cosa","da","dal","dalla","dei","del","della","delle","dello","di",
    "e","ed","gli","ha","hanno","ho","il","in","io","la","le","lei","lo","loro","lui","ma","mi","mio","ne","nel","nella","noi","non",
    "per","più","quella","quello","questa","questo","se","si","sono","su","sua","suo","sul","sulla","ti","tra","tu","un","una","uno","voi",
];

const DE: &[&str] = &[
    "aber","als","am","an","auch","auf","aus","bei","bin","bis","bist","da","dann","das","dass","dem","den","der","des","die","dir","doch",
    "du","ein","eine","einem","einen","einer","eines","er","es","für","hat","hatte","ich","ihm","ihn","ihr","im","in","ist","ja","kein",
    "mich","mir","mit","nach","nicht","noch","nur","ob","oder","ohne","sich","sie","sind","so","über","um","und","uns","unter","vom","von",
    "vor","war","was","weil","wenn","wie","wir","wird","zu","zum","zur",
];

const PT: &[&str] = &[
    "ao","aos","as","com","como","da","das","de","do","dos","e","ela","elas","ele","eles","em","entre","era","essa","esse","esta","este",
    "eu","foi","há","isso","isto","já","lhe","mais","mas","me","mesmo","meu","minha","muito","na","nas","nem","no","nos","não","o","os",
    "ou","para","pela","pelo","por","qual","quando","que","se","sem","seu","sua","são","também","te","um","uma","você",
];

/// Immutable set of stop words for a fixed selection of languages.
#[derive(Debug, Clone)]
pub struct StopWords {
    languages: Vec<Language>,
    words: HashSet<&'static str>,
}

impl StopWords {
    pub fn for_languages(languages: &[Language]) -> Self {
        let words = languages.iter().flat_map(|l| l.stopwords().iter().copied()).collect();
        Self { languages: languages.to_vec(), words }
    }

    pub fn contains(&self, term: &str) -> bool {
        self.words.contains(term)
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }
}

static STOPWORDS: OnceLock<StopWords> = OnceLock::new();

/// Install the process-wide stop-word set. Only the first call takes effect;
/// returns false when a set was already installed (or lazily defaulted).
pub fn install_stopwords(languages: &[Language]) -> bool {
    let installed = STOPWORDS.set(StopWords::for_languages(languages)).is_ok();
    let active = stopwords();
    if installed {
        tracing::info!(languages = ?active.languages(), words = active.words.len(), "stop words installed");
    } else {
        tracing::debug!(requested = ?languages, kept = ?active.languages(), "stop words already installed");
    }
    installed
}

/// The process-wide stop-word set; every supported language unless installed otherwise.
pub fn stopwords() -> &'static StopWords {
    STOPWORDS.get_or_init(|| StopWords::for_languages(Language::ALL))
}

pub fn is_stopword(term: &str) -> bool {
    stopwords().contains(term)
}

/// Strip every non-alphanumeric char and lowercase. Shared by indexing and querying.
pub fn normalize(word: &str) -> String {
    word.chars().filter(|c| c.is_alphanumeric()).flat_map(char::to_lowercase).collect()
}

pub fn is_indexable(term: &str) -> bool {
    !term.is_empty() && !is_stopword(term)
}

/// Every whitespace-delimited word as (normalized, position). Words that normalize
/// to nothing or to a stop word are kept so positions line up with the raw body.
pub fn tokenize(text: &str) -> Vec<(String, usize)> {
    text.split_whitespace().enumerate().map(|(pos, word)| (normalize(word), pos)).collect()
}

/// The tokens that go into the index, positions untouched.
pub fn indexable_tokens(text: &str) -> impl Iterator<Item = (String, usize)> + '_ {
    text.split_whitespace()
        .enumerate()
        .map(|(pos, word)| (normalize(word), pos))
        .filter(|(term, _)| is_indexable(term))
}

/// Normalized, de-duplicated query terms in query order.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .split_whitespace()
        .map(normalize)
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}
