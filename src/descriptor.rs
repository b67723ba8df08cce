//! Size accounting for cached values.

/// Maps a cached value to the number of bytes it accounts for.
///
/// The cache computes the size once, when a value is inserted, and caches the
/// result on the entry. Implementations must therefore return a stable value
/// for the lifetime of the value.
///
/// Any `Fn(&V) -> usize` closure is a descriptor:
///
/// ```
/// use counting_cache::ValueDescriptor;
///
/// let descriptor = |v: &Vec<u8>| v.len();
/// assert_eq!(descriptor.size_in_bytes(&vec![0u8; 16]), 16);
/// ```
pub trait ValueDescriptor<V: ?Sized>: Send + Sync {
    /// Returns the size of `value` in bytes.
    fn size_in_bytes(&self, value: &V) -> usize;
}

impl<V: ?Sized, F> ValueDescriptor<V> for F
where
    F: Fn(&V) -> usize + Send + Sync,
{
    #[inline]
    fn size_in_bytes(&self, value: &V) -> usize {
        self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bitmap {
        width: usize,
        height: usize,
    }

    struct ArgbDescriptor;

    impl ValueDescriptor<Bitmap> for ArgbDescriptor {
        fn size_in_bytes(&self, value: &Bitmap) -> usize {
            value.width * value.height * 4
        }
    }

    #[test]
    fn test_struct_descriptor() {
        let bitmap = Bitmap {
            width: 10,
            height: 20,
        };
        assert_eq!(ArgbDescriptor.size_in_bytes(&bitmap), 800);
    }

    #[test]
    fn test_closure_descriptor_on_unsized_value() {
        let descriptor = |s: &str| s.len();
        assert_eq!(descriptor.size_in_bytes("hello"), 5);
    }
}
