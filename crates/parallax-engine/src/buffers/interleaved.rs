use std::cell::RefCell;
use std::rc::Rc;

use super::{BufferKey, BufferSource, BufferUsage, Element, ElementKind, UpdateRange};

/// Interleaved storage shared by every view that reads from it.
///
/// The core is single-threaded, so shared ownership is `Rc<RefCell<_>>`.
pub type SharedInterleavedBuffer<T = f32> = Rc<RefCell<InterleavedBuffer<T>>>;

/// One array holding several attributes per vertex, `stride` elements apart.
#[derive(Debug)]
pub struct InterleavedBuffer<T: Element = f32> {
    key: BufferKey,
    array: Vec<T>,
    stride: usize,
    version: u32,
    usage: BufferUsage,
    update_ranges: Vec<UpdateRange>,
}

impl<T: Element> InterleavedBuffer<T> {
    pub fn new(array: Vec<T>, stride: usize) -> Self {
        let stride = stride.max(1);
        debug_assert!(array.len() % stride == 0, "array length is not a multiple of stride");

        Self {
            key: BufferKey::next(),
            array,
            stride,
            version: 0,
            usage: BufferUsage::Static,
            update_ranges: Vec::new(),
        }
    }

    pub fn into_shared(self) -> SharedInterleavedBuffer<T> {
        Rc::new(RefCell::new(self))
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of vertices.
    #[inline]
    pub fn count(&self) -> usize {
        self.array.len() / self.stride
    }

    #[inline]
    pub fn array(&self) -> &[T] {
        &self.array
    }

    #[inline]
    pub fn array_mut(&mut self) -> &mut [T] {
        &mut self.array
    }

    #[inline]
    pub fn set_usage(&mut self, usage: BufferUsage) {
        self.usage = usage;
    }

    #[inline]
    pub fn mark_dirty(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    pub fn add_update_range(&mut self, start: usize, count: usize) {
        self.update_ranges.push(UpdateRange::new(start, count));
    }
}

impl<T: Element> BufferSource for InterleavedBuffer<T> {
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

/// Lightweight view of one attribute inside an [`InterleavedBuffer`].
///
/// `offset` is measured in elements from the start of each vertex.
#[derive(Debug, Clone)]
pub struct InterleavedBufferAttribute<T: Element = f32> {
    data: SharedInterleavedBuffer<T>,
    pub name: String,
    item_size: usize,
    offset: usize,
}

impl<T: Element> InterleavedBufferAttribute<T> {
    pub fn new(data: SharedInterleavedBuffer<T>, item_size: usize, offset: usize) -> Self {
        Self {
            data,
            name: String::new(),
            item_size,
            offset,
        }
    }

    #[inline]
    pub fn data(&self) -> &SharedInterleavedBuffer<T> {
        &self.data
    }

    #[inline]
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn byte_offset(&self) -> usize {
        self.offset * T::KIND.byte_size()
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.data.borrow().count()
    }

    #[inline]
    fn slot(&self, stride: usize, index: usize, component: usize) -> usize {
        debug_assert!(component < self.item_size);
        index * stride + self.offset + component
    }

    pub fn get(&self, index: usize, component: usize) -> T {
        let buf = self.data.borrow();
        buf.array[self.slot(buf.stride, index, component)]
    }

    #[inline]
    pub fn get_x(&self, index: usize) -> T {
        self.get(index, 0)
    }

    #[inline]
    pub fn get_y(&self, index: usize) -> T {
        self.get(index, 1)
    }

    pub fn set(&self, index: usize, component: usize, value: T) {
        let mut buf = self.data.borrow_mut();
        let at = self.slot(buf.stride, index, component);
        buf.array[at] = value;
    }

    pub fn set_xy(&self, index: usize, x: T, y: T) {
        let mut buf = self.data.borrow_mut();
        let at = self.slot(buf.stride, index, 0);
        buf.array[at] = x;
        buf.array[at + 1] = y;
    }
}
