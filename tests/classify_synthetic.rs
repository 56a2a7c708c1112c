//! Seeded synthetic suite: properties that must hold for any input, not just
//! hand-picked sentences.

use defect_classifier::{normalize, Classification, Classifier, Confidence, GENERAL, UNCLASSIFIED};
use rand::{rngs::StdRng, Rng, SeedableRng};

const SEED: u64 = 0x5eed_d3f3;

const KNOWN: &[&str] = &[
    "vazamento de óleo pelo retentor",
    "motor aqueceu muito",
    "problema na bateria",
    "virabrequim quebrou",
    "embreagem patinando",
    "termostato preso",
    "vazamento pelo bujão",
];

/* ----------------------------
Generators
---------------------------- */

fn random_text(rng: &mut StdRng, alphabet: &[char], max_len: usize) -> String {
    let len = rng.random_range(0..=max_len);
    (0..len)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())])
        .collect()
}

/// Same words, different surface: random case, separators and punctuation.
fn disguise(rng: &mut StdRng, text: &str) -> String {
    const SEPARATORS: &[&str] = &[" ", "  ", " - ", ", ", "\t", " ... ", "/"];
    let mut out = String::new();
    if rng.random_bool(0.3) {
        out.push_str("  ¿");
    }
    for (i, word) in text.split(' ').enumerate() {
        if i > 0 {
            out.push_str(SEPARATORS[rng.random_range(0..SEPARATORS.len())]);
        }
        for ch in word.chars() {
            if rng.random_bool(0.5) {
                out.extend(ch.to_uppercase());
            } else {
                out.push(ch);
            }
        }
    }
    if rng.random_bool(0.5) {
        out.push_str("!!");
    }
    out
}

fn depth_of(c: &Classification) -> Confidence {
    if c.group == UNCLASSIFIED {
        Confidence::Unmatched
    } else if c.subgroup == GENERAL {
        Confidence::Group
    } else if c.subsubgroup == GENERAL {
        Confidence::Subgroup
    } else {
        Confidence::SubSubgroup
    }
}

fn clf() -> Classifier {
    Classifier::builtin().expect("built-in taxonomy")
}

/* ----------------------------
Properties
---------------------------- */

#[test]
fn punctuation_and_whitespace_only_is_unclassified() {
    let mut rng = StdRng::seed_from_u64(SEED);
    let alphabet: Vec<char> = " \t\n.,;:!?-_()[]{}\"'/\\@#$%&*+=<>|~^`".chars().collect();
    let c = clf();
    for _ in 0..500 {
        let text = random_text(&mut rng, &alphabet, 40);
        assert_eq!(normalize(&text), "", "{text:?}");
        assert_eq!(c.classify(&text), Classification::unclassified(), "{text:?}");
    }
}

#[test]
fn confidence_is_on_the_fixed_scale_and_matches_depth() {
    let mut rng = StdRng::seed_from_u64(SEED ^ 1);
    let alphabet: Vec<char> = "abcdeilmnoprstuvzáãçéóô  ".chars().collect();
    let c = clf();
    let scale: Vec<f64> = Confidence::ALL.iter().map(|c| c.value()).collect();

    for _ in 0..2000 {
        let text = random_text(&mut rng, &alphabet, 60);
        let r = c.classify(&text);
        assert!(scale.contains(&r.confidence.value()), "{text:?}: {r:?}");
        assert_eq!(r.confidence, depth_of(&r), "{text:?}: {r:?}");
        if r.confidence == Confidence::Unmatched {
            assert_eq!(r, Classification::unclassified());
        }
    }
}

#[test]
fn surface_variation_does_not_change_result() {
    let mut rng = StdRng::seed_from_u64(SEED ^ 2);
    let c = clf();
    for text in KNOWN {
        let expected = c.classify(text);
        assert!(expected.is_classified(), "{text}");
        for _ in 0..50 {
            let variant = disguise(&mut rng, text);
            assert_eq!(c.classify(&variant), expected, "{variant:?} vs {text:?}");
        }
    }
}

#[test]
fn batch_equals_one_by_one() {
    let mut rng = StdRng::seed_from_u64(SEED ^ 3);
    let alphabet: Vec<char> = "abcdeilmnoprstuvz ".chars().collect();
    let c = clf();

    let texts: Vec<Option<String>> = (0..300)
        .map(|i| match i % 5 {
            0 => None,
            1 => Some(KNOWN[rng.random_range(0..KNOWN.len())].to_string()),
            _ => Some(random_text(&mut rng, &alphabet, 30)),
        })
        .collect();

    let batch = c.classify_many(texts.iter().map(|t| t.as_deref()));
    assert_eq!(batch.len(), texts.len());
    for (t, r) in texts.iter().zip(&batch) {
        assert_eq!(*r, c.classify_opt(t.as_deref()), "{t:?}");
    }
    // Same input, same output.
    assert_eq!(batch, c.classify_many(texts.iter().map(|t| t.as_deref())));
}
