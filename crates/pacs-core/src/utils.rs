//! 通用工具函数

use std::collections::HashSet;
use std::hash::Hash;

/// 按逻辑标识合并两个结果列表
///
/// 返回新列表，先复制 `primary`，再依次追加 `secondary` 中标识尚未出现的项。
/// 标识冲突时保留先出现的项（主列表优先）。标识为 `None` 的项从不与任何项相等，
/// 因此总会被追加。
pub fn union_merge<T, K, F>(primary: &[T], secondary: &[T], identity: F) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> Option<K>,
{
    let mut merged = Vec::with_capacity(primary.len() + secondary.len());
    merged.extend_from_slice(primary);

    let mut seen: HashSet<K> = primary.iter().filter_map(&identity).collect();

    for item in secondary {
        match identity(item) {
            Some(key) => {
                if seen.insert(key) {
                    merged.push(item.clone());
                }
            }
            None => merged.push(item.clone()),
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        key: Option<u8>,
        source: &'static str,
    }

    fn row(key: Option<u8>, source: &'static str) -> Row {
        Row { key, source }
    }

    #[test]
    fn test_primary_wins_on_collision() {
        let primary = vec![row(Some(1), "primary")];
        let secondary = vec![row(Some(1), "secondary"), row(Some(2), "secondary")];

        let merged = union_merge(&primary, &secondary, |r| r.key);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], row(Some(1), "primary"));
        assert_eq!(merged[1], row(Some(2), "secondary"));
    }

    #[test]
    fn test_secondary_duplicates_collapse() {
        let merged = union_merge(
            &[],
            &[row(Some(3), "a"), row(Some(3), "b")],
            |r: &Row| r.key,
        );
        assert_eq!(merged, vec![row(Some(3), "a")]);
    }

    #[test]
    fn test_primary_duplicates_kept() {
        let primary = vec![row(Some(4), "a"), row(Some(4), "b")];
        let merged = union_merge(&primary, &[], |r| r.key);
        assert_eq!(merged, primary);
    }

    #[test]
    fn test_absent_identities_never_collapse() {
        // 空标识不视为相等
        let primary = vec![row(None, "primary")];
        let secondary = vec![row(None, "secondary"), row(None, "secondary")];

        let merged = union_merge(&primary, &secondary, |r| r.key);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_inputs_untouched() {
        let primary = vec![row(Some(1), "p"), row(Some(2), "p")];
        let secondary = vec![row(Some(2), "s"), row(Some(5), "s")];
        let primary_before = primary.clone();
        let secondary_before = secondary.clone();

        let _ = union_merge(&primary, &secondary, |r| r.key);

        assert_eq!(primary, primary_before);
        assert_eq!(secondary, secondary_before);
    }

    proptest! {
        #[test]
        fn prop_merge_size_and_precedence(
            primary_keys in proptest::collection::vec(0u8..16, 0..12),
            secondary_keys in proptest::collection::vec(0u8..16, 0..12),
        ) {
            let primary: Vec<Row> = primary_keys.iter().map(|k| row(Some(*k), "p")).collect();
            let secondary: Vec<Row> = secondary_keys.iter().map(|k| row(Some(*k), "s")).collect();

            let merged = union_merge(&primary, &secondary, |r| r.key);

            let primary_set: HashSet<u8> = primary_keys.iter().copied().collect();
            let fresh: HashSet<u8> = secondary_keys
                .iter()
                .copied()
                .filter(|k| !primary_set.contains(k))
                .collect();

            prop_assert_eq!(merged.len(), primary.len() + fresh.len());
            prop_assert_eq!(&merged[..primary.len()], &primary[..]);
            for item in &merged[primary.len()..] {
                prop_assert!(!primary_set.contains(&item.key.unwrap()));
            }
        }
    }
}
