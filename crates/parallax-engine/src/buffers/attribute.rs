use super::{BufferKey, BufferSource, BufferUsage, Element, ElementKind, UpdateRange};

/// Typed vertex/index storage with a dirty-version counter.
///
/// `array.len()` is always a multiple of `item_size`; `count()` is the number
/// of vertices (or indices when `item_size == 1`).
#[derive(Debug)]
pub struct BufferAttribute<T: Element> {
    key: BufferKey,
    pub name: String,
    array: Vec<T>,
    item_size: usize,
    version: u32,
    usage: BufferUsage,
    update_ranges: Vec<UpdateRange>,
}

impl<T: Element> BufferAttribute<T> {
    /// Trailing elements that do not form a whole item are dropped.
    pub fn new(mut array: Vec<T>, item_size: usize) -> Self {
        let item_size = item_size.max(1);
        debug_assert!(array.len() % item_size == 0, "array length is not a multiple of item size");
        array.truncate(array.len() - array.len() % item_size);

        Self {
            key: BufferKey::next(),
            name: String::new(),
            array,
            item_size,
            version: 0,
            usage: BufferUsage::Static,
            update_ranges: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_usage(mut self, usage: BufferUsage) -> Self {
        self.usage = usage;
        self
    }

    #[inline]
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.array.len() / self.item_size
    }

    #[inline]
    pub fn array(&self) -> &[T] {
        &self.array
    }

    /// Raw mutable access. Does not bump the version.
    #[inline]
    pub fn array_mut(&mut self) -> &mut [T] {
        &mut self.array
    }

    /// Component `component` of item `index`.
    #[inline]
    pub fn get(&self, index: usize, component: usize) -> T {
        self.array[index * self.item_size + component]
    }

    #[inline]
    pub fn get_x(&self, index: usize) -> T {
        self.get(index, 0)
    }

    #[inline]
    pub fn get_y(&self, index: usize) -> T {
        self.get(index, 1)
    }

    #[inline]
    pub fn set(&mut self, index: usize, component: usize, value: T) {
        self.array[index * self.item_size + component] = value;
    }

    #[inline]
    pub fn set_xy(&mut self, index: usize, x: T, y: T) {
        let at = index * self.item_size;
        self.array[at] = x;
        self.array[at + 1] = y;
    }

    /// All components of item `index`.
    #[inline]
    pub fn item(&self, index: usize) -> &[T] {
        let at = index * self.item_size;
        &self.array[at..at + self.item_size]
    }

    #[inline]
    pub fn set_usage(&mut self, usage: BufferUsage) {
        self.usage = usage;
    }

    /// Flags the contents as changed so the next render re-uploads them.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    pub fn add_update_range(&mut self, start: usize, count: usize) {
        self.update_ranges.push(UpdateRange::new(start, count));
    }

    /// Replaces the contents and bumps the version. A different length is
    /// rejected at the next GPU sync.
    pub fn set_array(&mut self, mut array: Vec<T>) {
        array.truncate(array.len() - array.len() % self.item_size);
        self.array = array;
        self.update_ranges.clear();
        self.mark_dirty();
    }

    pub fn into_vec(self) -> Vec<T> {
        self.array
    }
}

impl<T: Element> BufferSource for BufferAttribute<T> {
    fn key(&self) -> BufferKey {
        self.key
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn kind(&self) -> ElementKind {
        T::KIND
    }

    fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.array)
    }

    fn update_ranges(&self) -> &[UpdateRange] {
        &self.update_ranges
    }

    fn clear_update_ranges(&mut self) {
        self.update_ranges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_follows_item_size() {
        let attr = BufferAttribute::new(vec![0.0f32; 12], 4);
        assert_eq!(attr.count(), 3);
        assert_eq!(attr.item(2).len(), 4);
    }

    #[test]
    fn writes_do_not_bump_version_until_marked() {
        let mut attr = BufferAttribute::new(vec![0.0f32; 4], 2);
        attr.set_xy(1, 3.0, 4.0);
        assert_eq!(attr.version(), 0);
        assert_eq!((attr.get_x(1), attr.get_y(1)), (3.0, 4.0));

        attr.mark_dirty();
        assert_eq!(attr.version(), 1);
    }

    #[test]
    fn keys_are_unique() {
        let a = BufferAttribute::new(vec![0u16; 3], 1);
        let b = BufferAttribute::new(vec![0u16; 3], 1);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn bytes_match_element_size() {
        let attr = BufferAttribute::new(vec![1u16, 2, 3], 1);
        assert_eq!(attr.bytes().len(), 6);
        assert_eq!(attr.kind().byte_size(), 2);
    }
}
