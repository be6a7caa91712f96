//! Porter stemmer.
//!
//! Implements the original five-step suffix-stripping algorithm from
//! Porter, M.F. (1980), "An algorithm for suffix stripping", Program 14(3),
//! 130-137.
//!
//! # Notation
//!
//! A word is viewed as `[C](VC){m}[V]` where `C` is a run of consonants and
//! `V` a run of vowels; `m` is the *measure*. `y` counts as a vowel when it
//! follows a consonant. Rule conditions are evaluated on the stem that
//! remains after removing the matched suffix.
//!
//! # Rule precedence
//!
//! Within a step, the longest matching suffix wins; suffixes of equal length
//! keep declaration order. Once a suffix is selected its condition decides
//! the step: a failed condition ends the step without trying shorter
//! suffixes (so `feed` keeps its `-eed` and is not re-read as `-ed`).
//!
//! # Input domain
//!
//! ASCII-alphabetic words of three letters or more are stemmed. Uppercase
//! letters are folded first, so the stem is always lowercase. Shorter words
//! and words containing anything else (digits, punctuation, non-ASCII
//! letters) are returned unchanged.

// ─── Rule tables ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Condition {
    Always,
    /// `m > n`
    MeasureAbove(usize),
    /// `*v*`: the stem contains a vowel.
    HasVowel,
    /// `m > n` and the stem ends with `s` or `t`.
    MeasureAboveEndsST(usize),
}

impl Condition {
    fn holds(self, stem: &[u8]) -> bool {
        match self {
            Self::Always => true,
            Self::MeasureAbove(n) => measure(stem) > n,
            Self::HasVowel => contains_vowel(stem),
            Self::MeasureAboveEndsST(n) => {
                measure(stem) > n && matches!(stem.last(), Some(b's' | b't'))
            }
        }
    }
}

#[derive(Debug)]
struct Rule {
    suffix: &'static str,
    replacement: &'static str,
    condition: Condition,
}

const fn rule(suffix: &'static str, replacement: &'static str, condition: Condition) -> Rule {
    Rule {
        suffix,
        replacement,
        condition,
    }
}

use Condition::{Always, HasVowel, MeasureAbove, MeasureAboveEndsST};

static STEP_1A: &[Rule] = &[
    rule("sses", "ss", Always),
    rule("ies", "i", Always),
    rule("ss", "ss", Always),
    rule("s", "", Always),
];

static STEP_1B: &[Rule] = &[
    rule("eed", "ee", MeasureAbove(0)),
    rule("ed", "", HasVowel),
    rule("ing", "", HasVowel),
];

static STEP_1C: &[Rule] = &[rule("y", "i", HasVowel)];

static STEP_2: &[Rule] = &[
    rule("ational", "ate", MeasureAbove(0)),
    rule("tional", "tion", MeasureAbove(0)),
    rule("enci", "ence", MeasureAbove(0)),
    rule("anci", "ance", MeasureAbove(0)),
    rule("izer", "ize", MeasureAbove(0)),
    rule("abli", "able", MeasureAbove(0)),
    rule("alli", "al", MeasureAbove(0)),
    rule("entli", "ent", MeasureAbove(0)),
    rule("eli", "e", MeasureAbove(0)),
    rule("ousli", "ous", MeasureAbove(0)),
    rule("ization", "ize", MeasureAbove(0)),
    rule("ation", "ate", MeasureAbove(0)),
    rule("ator", "ate", MeasureAbove(0)),
    rule("alism", "al", MeasureAbove(0)),
    rule("iveness", "ive", MeasureAbove(0)),
    rule("fulness", "ful", MeasureAbove(0)),
    rule("ousness", "ous", MeasureAbove(0)),
    rule("aliti", "al", MeasureAbove(0)),
    rule("iviti", "ive", MeasureAbove(0)),
    rule("biliti", "ble", MeasureAbove(0)),
];

static STEP_3: &[Rule] = &[
    rule("icate", "ic", MeasureAbove(0)),
    rule("ative", "", MeasureAbove(0)),
    rule("alize", "al", MeasureAbove(0)),
    rule("iciti", "ic", MeasureAbove(0)),
    rule("ical", "ic", MeasureAbove(0)),
    rule("ful", "", MeasureAbove(0)),
    rule("ness", "", MeasureAbove(0)),
];

static STEP_4: &[Rule] = &[
    rule("al", "", MeasureAbove(1)),
    rule("ance", "", MeasureAbove(1)),
    rule("ence", "", MeasureAbove(1)),
    rule("er", "", MeasureAbove(1)),
    rule("ic", "", MeasureAbove(1)),
    rule("able", "", MeasureAbove(1)),
    rule("ible", "", MeasureAbove(1)),
    rule("ant", "", MeasureAbove(1)),
    rule("ement", "", MeasureAbove(1)),
    rule("ment", "", MeasureAbove(1)),
    rule("ent", "", MeasureAbove(1)),
    rule("ion", "", MeasureAboveEndsST(1)),
    rule("ou", "", MeasureAbove(1)),
    rule("ism", "", MeasureAbove(1)),
    rule("ate", "", MeasureAbove(1)),
    rule("iti", "", MeasureAbove(1)),
    rule("ous", "", MeasureAbove(1)),
    rule("ive", "", MeasureAbove(1)),
    rule("ize", "", MeasureAbove(1)),
];

// ─── Letter classes and measure ─────────────────────────────────────────────

/// Consonant flag for every byte of `word`, computed in one left-to-right
/// pass. `y` is a consonant at the start or after a vowel.
fn consonant_flags(word: &[u8]) -> Vec<bool> {
    let mut prev_consonant = false;
    word.iter()
        .map(|&b| {
            let consonant = match b {
                b'a' | b'e' | b'i' | b'o' | b'u' => false,
                b'y' => !prev_consonant,
                _ => true,
            };
            prev_consonant = consonant;
            consonant
        })
        .collect()
}

/// Number of vowel-consonant sequences in `word`.
fn measure(word: &[u8]) -> usize {
    consonant_flags(word)
        .windows(2)
        .filter(|pair| !pair[0] && pair[1])
        .count()
}

fn contains_vowel(word: &[u8]) -> bool {
    consonant_flags(word).iter().any(|&consonant| !consonant)
}

/// `*d`: ends with a double consonant.
fn ends_double_consonant(word: &[u8]) -> bool {
    let n = word.len();
    n >= 2 && word[n - 1] == word[n - 2] && consonant_flags(word)[n - 1]
}

/// `*o`: ends consonant-vowel-consonant, last consonant not `w`, `x`, `y`.
fn ends_cvc(word: &[u8]) -> bool {
    let n = word.len();
    if n < 3 || matches!(word[n - 1], b'w' | b'x' | b'y') {
        return false;
    }
    let flags = consonant_flags(word);
    flags[n - 3] && !flags[n - 2] && flags[n - 1]
}

// ─── Rule application ───────────────────────────────────────────────────────

enum StepOutcome {
    NoMatch,
    Blocked,
    Applied(&'static str),
}

fn apply_longest(word: &mut Vec<u8>, rules: &'static [Rule]) -> StepOutcome {
    let mut best: Option<&'static Rule> = None;
    for rule in rules {
        let longer = best.map_or(true, |b| rule.suffix.len() > b.suffix.len());
        if longer && word.ends_with(rule.suffix.as_bytes()) {
            best = Some(rule);
        }
    }
    let Some(rule) = best else {
        return StepOutcome::NoMatch;
    };

    let stem_len = word.len() - rule.suffix.len();
    if !rule.condition.holds(&word[..stem_len]) {
        return StepOutcome::Blocked;
    }
    word.truncate(stem_len);
    word.extend_from_slice(rule.replacement.as_bytes());
    StepOutcome::Applied(rule.suffix)
}

fn step_1b(word: &mut Vec<u8>) {
    match apply_longest(word, STEP_1B) {
        StepOutcome::Applied("ed") | StepOutcome::Applied("ing") => {}
        _ => return,
    }

    if word.ends_with(b"at") || word.ends_with(b"bl") || word.ends_with(b"iz") {
        word.push(b'e');
    } else if ends_double_consonant(word) && !matches!(word.last(), Some(b'l' | b's' | b'z')) {
        word.pop();
    } else if measure(word) == 1 && ends_cvc(word) {
        word.push(b'e');
    }
}

fn step_5(word: &mut Vec<u8>) {
    if word.last() == Some(&b'e') {
        let stem = &word[..word.len() - 1];
        let m = measure(stem);
        if m > 1 || (m == 1 && !ends_cvc(stem)) {
            word.pop();
        }
    }

    if measure(word) > 1 && ends_double_consonant(word) && word.last() == Some(&b'l') {
        word.pop();
    }
}

// ─── Public API ─────────────────────────────────────────────────────────────

/// `true` if `word` is in the stemmer's input domain.
pub fn is_stemmable(word: &str) -> bool {
    word.len() > 2 && word.bytes().all(|b| b.is_ascii_alphabetic())
}

/// Reduce `word` to its Porter stem.
///
/// ```
/// use rapid_textnorm::nlp::porter::stem;
///
/// assert_eq!(stem("caresses"), "caress");
/// assert_eq!(stem("ponies"), "poni");
/// assert_eq!(stem("Connected"), "connect");
/// assert_eq!(stem("2020"), "2020");
/// ```
pub fn stem(word: &str) -> String {
    if !is_stemmable(word) {
        return word.to_string();
    }

    let mut w = word.to_ascii_lowercase().into_bytes();
    apply_longest(&mut w, STEP_1A);
    step_1b(&mut w);
    apply_longest(&mut w, STEP_1C);
    apply_longest(&mut w, STEP_2);
    apply_longest(&mut w, STEP_3);
    apply_longest(&mut w, STEP_4);
    step_5(&mut w);

    // Only ASCII bytes were removed or appended.
    String::from_utf8(w).unwrap_or_else(|_| word.to_string())
}
