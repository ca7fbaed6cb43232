use crate::error::Rfc2136Error;

/// Default number of endpoints carried by a single update message.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Splits `items` into order-preserving groups of at most `size` elements.
/// Only the last group may be shorter.
pub fn chunk<T>(items: &[T], size: usize) -> Result<Vec<&[T]>, Rfc2136Error> {
    if size == 0 {
        return Err(Rfc2136Error::InvalidConfiguration(
            "batch size must be at least 1".into(),
        ));
    }
    Ok(items.chunks(size).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split() {
        let items: Vec<u32> = (0..10).collect();
        let chunks = chunk(&items, 2).unwrap();
        assert_eq!(chunks.len(), 5);
        assert!(chunks.iter().all(|c| c.len() == 2));
    }

    #[test]
    fn short_tail() {
        let items: Vec<u32> = (0..7).collect();
        let chunks = chunk(&items, 3).unwrap();
        assert_eq!(chunks, vec![&[0, 1, 2][..], &[3, 4, 5][..], &[6][..]]);
    }

    #[test]
    fn empty_input() {
        let items: Vec<u32> = Vec::new();
        assert!(chunk(&items, 3).unwrap().is_empty());
    }

    #[test]
    fn zero_size_is_invalid() {
        assert!(matches!(
            chunk(&[1, 2, 3], 0),
            Err(Rfc2136Error::InvalidConfiguration(_))
        ));
    }
}
