const FNV_OFFSET: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// Order-independent key for a set of image ids.
///
/// Ids are sorted, deduplicated and joined with `|`; the result is hashed with
/// 32-bit FNV-1a over UTF-16 code units and rendered as 8 hex digits.
pub fn group_hash<'a, I>(ids: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ids: Vec<&str> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();

    let joined = ids.join("|");
    let hash = joined
        .encode_utf16()
        .fold(FNV_OFFSET, |h, unit| (h ^ unit as u32).wrapping_mul(FNV_PRIME));

    format!("{hash:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_hashes_to_the_offset_basis() {
        assert_eq!(group_hash([]), "811c9dc5");
    }

    #[test]
    fn known_vector() {
        // FNV-1a("a") = 0xe40c292c
        assert_eq!(group_hash(["a"]), "e40c292c");
    }

    #[test]
    fn order_and_duplicates_do_not_matter() {
        let a = group_hash(["sky.png", "hills.png", "tree.png"]);
        let b = group_hash(["tree.png", "sky.png", "hills.png", "sky.png"]);
        assert_eq!(a, b);
        assert_ne!(a, group_hash(["sky.png", "hills.png"]));
    }
}
