use snoopy_log_collator::merge::{line_key, KeyedReader, MergeTree};
use std::io::Cursor;

fn reader(label: &str, lines: &[String]) -> KeyedReader<Cursor<Vec<u8>>> {
    let mut text = lines.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    KeyedReader::new(label, Cursor::new(text.into_bytes())).unwrap()
}

/// Small deterministic generator so failures are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) % bound
    }
}

fn sorted_stream(rng: &mut Lcg, host: usize, len: usize) -> Vec<String> {
    let mut seconds: Vec<u64> = (0..len).map(|_| rng.next(3600)).collect();
    seconds.sort_unstable();
    seconds
        .into_iter()
        .map(|s| {
            format!(
                "20230101-{:02}:{:02}:{:02} host{host} root cmd",
                s / 3600,
                (s / 60) % 60,
                s % 60
            )
        })
        .collect()
}

#[test]
fn test_merge_is_sorted_permutation_of_inputs() {
    let mut rng = Lcg(42);
    for round in 0..20 {
        let stream_count = 1 + rng.next(12) as usize;
        let streams: Vec<Vec<String>> = (0..stream_count)
            .map(|host| {
                let len = rng.next(30) as usize;
                sorted_stream(&mut rng, host, len)
            })
            .collect();

        let mut tree = MergeTree::new();
        for (i, lines) in streams.iter().enumerate() {
            tree.insert(reader(&format!("s{i}"), lines));
        }
        let merged: Vec<String> = tree.collect::<Result<_, _>>().unwrap();

        let mut expected: Vec<String> = streams.concat();
        expected.sort();
        let mut actual = merged.clone();
        actual.sort();
        assert_eq!(actual, expected, "round {round}: lines lost or duplicated");

        for pair in merged.windows(2) {
            assert!(
                line_key(&pair[0]) <= line_key(&pair[1]),
                "round {round}: {} after {}",
                pair[1],
                pair[0]
            );
        }
    }
}

#[test]
fn test_equal_keys_favour_first_stream() {
    let key = "20230101-00:00:01";
    let mut tree = MergeTree::new();
    for host in ["prior", "alpha", "beta"] {
        tree.insert(reader(host, &[format!("{key} {host} root ls")]));
    }

    let hosts: Vec<String> = tree
        .map(|line| line.unwrap().split_whitespace().nth(1).unwrap().to_string())
        .collect();
    assert_eq!(hosts, ["prior", "alpha", "beta"]);
}

#[test]
fn test_last_key_after_drain() {
    let mut tree = MergeTree::new();
    tree.insert(reader("a", &["20230101-00:00:05 a".to_string()]));
    tree.insert(reader("b", &["20230101-00:00:01 b".to_string()]));
    assert_eq!(tree.key(), Some("20230101-00:00:01"));

    while tree.next_line().unwrap().is_some() {}
    assert_eq!(tree.key(), None);
    assert_eq!(tree.last_key(), Some("20230101-00:00:05"));
}

#[test]
fn test_empty_tree() {
    let mut tree: MergeTree<Cursor<Vec<u8>>> = MergeTree::new();
    assert!(tree.is_empty());
    assert_eq!(tree.next_line().unwrap(), None);
    assert_eq!(tree.last_key(), None);
}
