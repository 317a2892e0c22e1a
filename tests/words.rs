use mtree::MTree;

// Levenshtein distance, a metric on strings. The tree never looks at
// the data objects themselves, only at distances between them.
fn edit_distance(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, &ca) in a.iter().enumerate() {
        let mut current = vec![i + 1];
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            let value = (previous[j] + cost)
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
            current.push(value);
        }
        previous = current;
    }
    previous[b.len()] as f64
}

const WORDS: &[&str] = &[
    "banana", "bandana", "cabana", "canada", "candle", "handle", "kindle", "bundle", "sandal",
    "vandal", "scandal", "panda", "pander", "wander", "wonder", "ponder", "powder", "polder",
    "bolder", "boulder", "shoulder", "smolder", "solder", "sober", "saber", "sabre", "fiber",
    "timber", "tamber", "amber", "ember", "umber", "lumber", "number", "slumber",
];

#[test]
fn indexes_words_under_edit_distance() {
    let mut tree =
        MTree::with_capacity(3, |a: &String, b: &String| edit_distance(a, b)).expect("valid capacity");
    for word in WORDS {
        tree.insert((*word).to_string());
        tree.check_invariants();
    }
    assert_eq!(tree.len(), WORDS.len());

    // Every range query must agree with a direct scan over the word
    // list.
    for query in ["band", "polder", "lumberjack", "zzzz"] {
        for radius in [1.0, 2.0, 4.0] {
            let mut expected: Vec<&str> = WORDS
                .iter()
                .copied()
                .filter(|word| edit_distance(word, query) <= radius)
                .collect();
            expected.sort_unstable();

            let mut actual: Vec<String> = tree
                .query_by_range(query.to_string(), radius)
                .map(|result| result.data.clone())
                .collect();
            actual.sort_unstable();
            assert_eq!(expected, actual);
        }
    }
}

#[test]
fn removing_words_keeps_queries_consistent() {
    let mut tree =
        MTree::with_capacity(2, |a: &String, b: &String| edit_distance(a, b)).expect("valid capacity");
    for word in WORDS {
        tree.insert((*word).to_string());
    }

    let mut remaining: Vec<&str> = WORDS.to_vec();
    // Drop every other word, checking the survivors after each removal.
    for word in WORDS.iter().step_by(2) {
        assert!(tree.remove(&(*word).to_string()));
        remaining.retain(|kept| kept != word);
        tree.check_invariants();

        let nearest: Vec<String> = tree
            .query_by_limit("wander".to_string(), 1)
            .map(|result| result.data.clone())
            .collect();
        let best = nearest.first().expect("tree is not empty");
        let best_distance = edit_distance(best, "wander");
        for kept in &remaining {
            assert!(edit_distance(kept, "wander") >= best_distance);
        }
    }
}
