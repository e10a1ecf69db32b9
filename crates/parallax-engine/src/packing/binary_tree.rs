use crate::coords::{PixelRect, Size};
use crate::error::{ParallaxError, Result};

use super::{finish, validate, ImageSource, PackResult, Packer};

/// Upper bound on the packed (pre-downscale) atlas side.
pub const DEFAULT_MAX_BIN_SIZE: u32 = 16384;

/// Binary-tree packer.
///
/// Images are placed largest area first. Each placement splits a free node
/// into a `right` node (remaining width, placed height) and a `down` node
/// (full width, remaining height). When nothing fits, the root grows right or
/// down, whichever keeps the bounding box closer to square.
#[derive(Debug, Clone)]
pub struct BinaryTreePacker {
    max_texture_size: u32,
    max_bin_size: u32,
}

impl BinaryTreePacker {
    pub fn new(max_texture_size: u32) -> Self {
        Self {
            max_texture_size,
            max_bin_size: DEFAULT_MAX_BIN_SIZE,
        }
    }

    pub fn with_max_bin_size(mut self, max_bin_size: u32) -> Self {
        self.max_bin_size = max_bin_size;
        self
    }
}

impl Packer for BinaryTreePacker {
    fn name(&self) -> &'static str {
        "binary-tree"
    }

    fn pack(&self, images: &[ImageSource]) -> Result<PackResult> {
        validate(images)?;

        let mut items: Vec<(&str, Size)> = images.iter().map(|i| (i.id.as_str(), i.size())).collect();
        // Stable: equal areas keep input order.
        items.sort_by(|a, b| b.1.area().cmp(&a.1.area()));

        let (first_id, first) = items[0];
        if first.w > self.max_bin_size || first.h > self.max_bin_size {
            return Err(ParallaxError::ResourceExhausted {
                id: first_id.to_string(),
                width: first.w,
                height: first.h,
                max: self.max_bin_size,
            });
        }
        let mut tree = Tree::new(first);
        let mut placed = Vec::with_capacity(items.len());

        for (id, size) in items {
            let node = match tree.find(size) {
                Some(node) => tree.split(node, size),
                None => tree.grow(size, self.max_bin_size).ok_or_else(|| {
                    ParallaxError::ResourceExhausted {
                        id: id.to_string(),
                        width: size.w,
                        height: size.h,
                        max: self.max_bin_size,
                    }
                })?,
            };

            let n = &tree.nodes[node];
            placed.push((id.to_string(), PixelRect::new(n.x, n.y, size.w, size.h)));
        }

        let packed = tree.size();
        log::debug!("binary-tree packed {} images into {}x{}", placed.len(), packed.w, packed.h);

        Ok(finish(placed, packed, self.max_texture_size))
    }
}

// ── tree ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Node {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    used: bool,
    right: Option<usize>,
    down: Option<usize>,
}

impl Node {
    fn free(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            used: false,
            right: None,
            down: None,
        }
    }
}

/// Node arena; `root` moves when the tree grows.
struct Tree {
    nodes: Vec<Node>,
    root: usize,
}

impl Tree {
    fn new(first: Size) -> Self {
        Self {
            nodes: vec![Node::free(0, 0, first.w, first.h)],
            root: 0,
        }
    }

    fn size(&self) -> Size {
        let r = &self.nodes[self.root];
        Size::new(r.w, r.h)
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Depth-first search for the first free node that fits `size`.
    fn find(&self, size: Size) -> Option<usize> {
        let mut stack = vec![self.root];

        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if node.used {
                // `down` is popped first.
                stack.extend(node.right);
                stack.extend(node.down);
                continue;
            }
            if size.w <= node.w && size.h <= node.h {
                return Some(idx);
            }
        }

        None
    }

    fn split(&mut self, idx: usize, size: Size) -> usize {
        let Node { x, y, w, h, .. } = self.nodes[idx];

        let down = self.push(Node::free(x, y + size.h, w, h - size.h));
        let right = self.push(Node::free(x + size.w, y, w - size.w, size.h));

        let node = &mut self.nodes[idx];
        node.used = true;
        node.down = Some(down);
        node.right = Some(right);
        idx
    }

    fn grow(&mut self, size: Size, max_bin_size: u32) -> Option<usize> {
        let root = self.size();

        let can_grow_down = size.w <= root.w && root.h + size.h <= max_bin_size;
        let can_grow_right = size.h <= root.h && root.w + size.w <= max_bin_size;

        let should_grow_right = can_grow_right && root.h >= root.w + size.w;
        let should_grow_down = can_grow_down && root.w >= root.h + size.h;

        if should_grow_right {
            self.grow_right(size)
        } else if should_grow_down {
            self.grow_down(size)
        } else if can_grow_right {
            self.grow_right(size)
        } else if can_grow_down {
            self.grow_down(size)
        } else {
            None
        }
    }

    fn grow_right(&mut self, size: Size) -> Option<usize> {
        let old = self.root;
        let root = self.size();

        let right = self.push(Node::free(root.w, 0, size.w, root.h));
        self.root = self.push(Node {
            x: 0,
            y: 0,
            w: root.w + size.w,
            h: root.h,
            used: true,
            right: Some(right),
            down: Some(old),
        });

        let node = self.find(size)?;
        Some(self.split(node, size))
    }

    fn grow_down(&mut self, size: Size) -> Option<usize> {
        let old = self.root;
        let root = self.size();

        let down = self.push(Node::free(0, root.h, root.w, size.h));
        self.root = self.push(Node {
            x: 0,
            y: 0,
            w: root.w,
            h: root.h + size.h,
            used: true,
            right: Some(old),
            down: Some(down),
        });

        let node = self.find(size)?;
        Some(self.split(node, size))
    }
}
