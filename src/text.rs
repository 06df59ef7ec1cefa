//! Text preprocessing: normalization, stopword removal and bigram expansion.

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// English stopword table (the scikit-learn list).
const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst",
    "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway",
    "anywhere", "are", "around", "as", "at", "back", "be", "became", "because", "become",
    "becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below", "beside",
    "besides", "between", "beyond", "bill", "both", "bottom", "but", "by", "call", "can",
    "cannot", "cant", "co", "con", "could", "couldnt", "cry", "de", "describe", "detail", "do",
    "done", "down", "due", "during", "each", "eg", "eight", "either", "eleven", "else",
    "elsewhere", "empty", "enough", "etc", "even", "ever", "every", "everyone", "everything",
    "everywhere", "except", "few", "fifteen", "fifty", "fill", "find", "fire", "first", "five",
    "for", "former", "formerly", "forty", "found", "four", "from", "front", "full", "further",
    "get", "give", "go", "had", "has", "hasnt", "have", "he", "hence", "her", "here",
    "hereafter", "hereby", "herein", "hereupon", "hers", "herself", "him", "himself", "his",
    "how", "however", "hundred", "i", "ie", "if", "in", "inc", "indeed", "interest", "into",
    "is", "it", "its", "itself", "keep", "last", "latter", "latterly", "least", "less", "ltd",
    "made", "many", "may", "me", "meanwhile", "might", "mill", "mine", "more", "moreover",
    "most", "mostly", "move", "much", "must", "my", "myself", "name", "namely", "neither",
    "never", "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not",
    "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto", "or",
    "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own", "part",
    "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem", "seemed",
    "seeming", "seems", "serious", "several", "she", "should", "show", "side", "since",
    "sincere", "six", "sixty", "so", "some", "somehow", "someone", "something", "sometime",
    "sometimes", "somewhere", "still", "such", "system", "take", "ten", "than", "that", "the",
    "their", "them", "themselves", "then", "thence", "there", "thereafter", "thereby",
    "therefore", "therein", "thereupon", "these", "they", "thick", "thin", "third", "this",
    "those", "though", "three", "through", "throughout", "thru", "thus", "to", "together", "too",
    "top", "toward", "towards", "twelve", "twenty", "two", "un", "under", "until", "up", "upon",
    "us", "very", "via", "was", "we", "well", "were", "what", "whatever", "when", "whence",
    "whenever", "where", "whereafter", "whereas", "whereby", "wherein", "whereupon", "wherever",
    "whether", "which", "while", "whither", "who", "whoever", "whole", "whom", "whose", "why",
    "will", "with", "within", "without", "would", "yet", "you", "your", "yours", "yourself",
    "yourselves",
];

static STOP_WORDS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ENGLISH_STOP_WORDS.iter().copied().collect());

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(word)
}

/// Lowercases and replaces every character that is neither a word character
/// nor whitespace with a space.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ch == '_' || ch.is_whitespace() {
                ch
            } else {
                ' '
            }
        })
        .collect()
}

/// Unigrams that survive stopword, length and alphabetic filtering, in text order.
pub fn unigrams(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .filter(|token| !is_stop_word(token))
        .filter(|token| token.chars().count() > 2 && token.chars().all(char::is_alphabetic))
        .map(str::to_string)
        .collect()
}

/// Full token stream: surviving unigrams followed by their adjacent bigrams.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = unigrams(text);
    let bigrams: Vec<String> = tokens
        .windows(2)
        .map(|pair| format!("{}_{}", pair[0], pair[1]))
        .collect();
    tokens.extend(bigrams);
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_becomes_whitespace() {
        assert_eq!(normalize("Web-based, AI!"), "web based  ai ");
    }

    #[test]
    fn filters_stopwords_short_and_non_alpha_tokens() {
        let tokens = unigrams("The IoT sensor network for 3d farming with v2 robots");
        assert_eq!(tokens, vec!["iot", "sensor", "network", "farming", "robots"]);
    }

    #[test]
    fn bigrams_follow_unigrams() {
        let tokens = tokenize("Smart irrigation controller");
        assert_eq!(
            tokens,
            vec![
                "smart",
                "irrigation",
                "controller",
                "smart_irrigation",
                "irrigation_controller"
            ]
        );
    }

    #[test]
    fn empty_text_yields_no_tokens() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("a an the of").is_empty());
    }
}
