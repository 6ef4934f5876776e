//! Bounding volume hierarchy.
//!
//! Build reorders the primitive array in place so every node owns a
//! contiguous range. Besides child indices each node carries `hit_idx` /
//! `miss_idx` links forming a stackless traversal thread, which is what a
//! GPU kernel walks. Three traversal modes are provided and must report
//! identical hits.

use crate::hit::Intersection;
use crate::image_buf::{project_to_screen, ImageU8};
use crate::primitive::Primitive;
use ember_math::{Aabb, Mat4, Ray, Vec3};

/// Maximum number of split candidates probed per SAH subdivision.
pub const SAH_MAX_SEARCH: usize = 256;

const STACK_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitMethod {
    Midpoint,
    #[default]
    Sah,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalMode {
    Recursive,
    Stack,
    #[default]
    Threaded,
}

#[derive(Debug, Clone, Copy)]
pub struct BvhNode {
    pub bound: Aabb,
    pub left: i32,
    pub right: i32,
    pub first_prim: i32,
    pub prim_count: i32,
    pub height: i32,
    /// Next node when this node's box is hit (interior nodes only).
    pub hit_idx: i32,
    /// Next node on a box miss or after finishing a leaf; negative ends
    /// the traversal.
    pub miss_idx: i32,
}

impl BvhNode {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.prim_count > 0
    }
}

pub struct Bvh {
    /// Primitives reordered so each node's range is contiguous.
    pub primitives: Vec<Primitive>,
    pub nodes: Vec<BvhNode>,
    pub split_method: SplitMethod,
    pub traversal: TraversalMode,
    pub max_objs: usize,
    pub max_height: i32,
    /// Forwarded to primitive intersection (light-distance tolerance).
    pub robust_light: bool,
    bound: Aabb,
}

impl Bvh {
    pub fn build(primitives: Vec<Primitive>, split_method: SplitMethod) -> Self {
        let mut bvh = Self {
            primitives,
            nodes: Vec::new(),
            split_method,
            traversal: TraversalMode::default(),
            max_objs: 2,
            max_height: 0,
            robust_light: false,
            bound: Aabb::EMPTY,
        };
        let n = bvh.primitives.len();
        if n == 0 {
            return bvh;
        }

        bvh.nodes.reserve(2 * n - 1);
        bvh.nodes.push(BvhNode {
            bound: Aabb::EMPTY,
            left: 0,
            right: 0,
            first_prim: 0,
            prim_count: n as i32,
            height: 0,
            hit_idx: -1,
            miss_idx: -1,
        });
        bvh.update_node_bound(0);
        bvh.subdivide(0);
        bvh.bound = bvh.nodes[0].bound;

        log::debug!(
            "bvh: {} primitives, {} nodes, height {}",
            n,
            bvh.nodes.len(),
            bvh.max_height
        );
        bvh
    }

    pub fn bound(&self) -> Aabb {
        self.bound
    }

    fn update_node_bound(&mut self, idx: usize) {
        let node = self.nodes[idx];
        let mut bound = Aabb::EMPTY;
        for i in 0..node.prim_count as usize {
            bound.grow(&self.primitives[node.first_prim as usize + i].bound());
        }
        self.nodes[idx].bound = bound;
    }

    fn subdivide(&mut self, idx: usize) {
        let node = self.nodes[idx];
        self.max_height = self.max_height.max(node.height);
        let count = node.prim_count as usize;
        if count <= self.max_objs {
            return;
        }
        let first = node.first_prim as usize;

        let left_count = match self.split_method {
            SplitMethod::Midpoint => self.split_midpoint(first, count, &node.bound),
            SplitMethod::Sah => self.split_sah(first, count, &node.bound),
        };
        let Some(left_count) = left_count else {
            return;
        };

        let child = |first_prim: usize, prim_count: usize| BvhNode {
            bound: Aabb::EMPTY,
            left: 0,
            right: 0,
            first_prim: first_prim as i32,
            prim_count: prim_count as i32,
            height: node.height + 1,
            hit_idx: -1,
            miss_idx: -1,
        };

        let left_idx = self.nodes.len();
        self.nodes.push(child(first, left_count));
        let right_idx = self.nodes.len();
        self.nodes.push(child(first + left_count, count - left_count));

        // Wire the stackless thread: enter the left child on a hit, escape
        // from the left child into the right one, and propagate the
        // parent's escape link through the right child.
        {
            let n = &mut self.nodes[idx];
            n.left = left_idx as i32;
            n.right = right_idx as i32;
            n.prim_count = 0;
            n.hit_idx = left_idx as i32;
        }
        self.nodes[left_idx].miss_idx = right_idx as i32;
        if node.miss_idx >= 0 {
            self.nodes[right_idx].miss_idx = node.miss_idx;
        }

        self.update_node_bound(left_idx);
        self.update_node_bound(right_idx);
        self.subdivide(left_idx);
        self.subdivide(right_idx);
    }

    /// Partition by centroid against the box midpoint, trying axes in
    /// descending extent order until one produces a non-degenerate split.
    fn split_midpoint(&mut self, first: usize, count: usize, bound: &Aabb) -> Option<usize> {
        let extent = bound.extent();
        for axis in sorted_axes(extent) {
            let pivot = bound.min[axis] + extent[axis] * 0.5;

            let mut i = first;
            let mut j = first + count;
            while i < j {
                if self.primitives[i].center()[axis] < pivot {
                    i += 1;
                } else {
                    j -= 1;
                    self.primitives.swap(i, j);
                }
            }

            let left_count = i - first;
            if left_count == 0 || left_count == count {
                continue;
            }
            return Some(left_count);
        }
        None
    }

    /// Surface-area heuristic: sort by centroid per axis, sweep split
    /// positions at a stride of `ceil(count / SAH_MAX_SEARCH)`, minimize
    /// `SA(L)*|L| + SA(R)*|R|`. Keeps the node a leaf when no candidate
    /// beats the leaf cost.
    fn split_sah(&mut self, first: usize, count: usize, bound: &Aabb) -> Option<usize> {
        let step = count.div_ceil(SAH_MAX_SEARCH).max(1);
        let mut best: Option<(f32, usize, usize)> = None;

        for axis in sorted_axes(bound.extent()) {
            self.sort_range(first, count, axis);
            let slice = &self.primitives[first..first + count];

            let mut prefix = vec![0.0f32; count + 1];
            let mut acc = Aabb::EMPTY;
            for (i, prim) in slice.iter().enumerate() {
                acc.grow(&prim.bound());
                prefix[i + 1] = acc.surface_area();
            }
            let mut suffix = vec![0.0f32; count + 1];
            let mut acc = Aabb::EMPTY;
            for i in (0..count).rev() {
                acc.grow(&slice[i].bound());
                suffix[i] = acc.surface_area();
            }

            let mut lc = step;
            while lc < count {
                let cost = prefix[lc] * lc as f32 + suffix[lc] * (count - lc) as f32;
                if best.map_or(true, |(c, _, _)| cost < c) {
                    best = Some((cost, axis, lc));
                }
                lc += step;
            }
        }

        let (cost, axis, left_count) = best?;
        if cost >= count as f32 * bound.surface_area() {
            return None;
        }
        self.sort_range(first, count, axis);
        Some(left_count)
    }

    fn sort_range(&mut self, first: usize, count: usize, axis: usize) {
        self.primitives[first..first + count].sort_unstable_by(|a, b| {
            a.center()[axis]
                .partial_cmp(&b.center()[axis])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    /// Closest-hit query. Shadow rays also resolve the closest hit so the
    /// identity-based visibility test stays meaningful, but primitives skip
    /// filling shading data for them.
    pub fn intersect(&self, ray: &Ray, isect: &mut Intersection) {
        if self.nodes.is_empty() || self.bound.intersect(ray).is_none() {
            return;
        }
        match self.traversal {
            TraversalMode::Recursive => self.intersect_recursive(ray, isect, 0),
            TraversalMode::Stack => self.intersect_stack(ray, isect),
            TraversalMode::Threaded => self.intersect_threaded(ray, isect),
        }
    }

    fn intersect_leaf(&self, node: &BvhNode, ray: &Ray, isect: &mut Intersection) {
        let first = node.first_prim as usize;
        for i in 0..node.prim_count as usize {
            let idx = first + i;
            self.primitives[idx].intersect(ray, isect, idx, self.robust_light);
        }
    }

    fn intersect_recursive(&self, ray: &Ray, isect: &mut Intersection, idx: usize) {
        let node = &self.nodes[idx];
        if node.bound.intersect(ray).is_none() {
            return;
        }
        if node.is_leaf() {
            self.intersect_leaf(node, ray, isect);
        } else {
            self.intersect_recursive(ray, isect, node.left as usize);
            self.intersect_recursive(ray, isect, node.right as usize);
        }
    }

    fn intersect_stack(&self, ray: &Ray, isect: &mut Intersection) {
        let mut stack = [0i32; STACK_SIZE];
        let mut ptr = 1usize;
        stack[0] = 0;

        while ptr > 0 {
            ptr -= 1;
            let node = &self.nodes[stack[ptr] as usize];

            if node.is_leaf() {
                if node.bound.intersect(ray).is_some() {
                    self.intersect_leaf(node, ray, isect);
                }
                continue;
            }

            let d0 = self.nodes[node.left as usize].bound.intersect(ray);
            let d1 = self.nodes[node.right as usize].bound.intersect(ray);

            // Push the far child first so the near one is visited first.
            match (d0, d1) {
                (Some(a), Some(b)) => {
                    let (near, far) = if a <= b {
                        (node.left, node.right)
                    } else {
                        (node.right, node.left)
                    };
                    if ptr + 2 <= STACK_SIZE {
                        stack[ptr] = far;
                        stack[ptr + 1] = near;
                        ptr += 2;
                    }
                }
                (Some(_), None) => {
                    stack[ptr] = node.left;
                    ptr += 1;
                }
                (None, Some(_)) => {
                    stack[ptr] = node.right;
                    ptr += 1;
                }
                (None, None) => {}
            }
        }
    }

    fn intersect_threaded(&self, ray: &Ray, isect: &mut Intersection) {
        let mut idx = 0i32;
        while idx >= 0 {
            let node = &self.nodes[idx as usize];
            if node.bound.intersect(ray).is_none() {
                idx = node.miss_idx;
                continue;
            }
            if node.is_leaf() {
                self.intersect_leaf(node, ray, isect);
                idx = node.miss_idx;
            } else {
                idx = node.hit_idx;
            }
        }
    }

    /// Draw every node box as lines through a projective transform.
    pub fn draw_wireframe(&self, image: &mut ImageU8, transform: &Mat4, color: Vec3) {
        for node in &self.nodes {
            draw_aabb(image, &node.bound, transform, color);
        }
    }
}

fn draw_aabb(image: &mut ImageU8, bound: &Aabb, transform: &Mat4, color: Vec3) {
    const EDGES: [(usize, usize); 12] = [
        (0, 1),
        (2, 3),
        (0, 2),
        (1, 3),
        (0, 4),
        (1, 5),
        (2, 6),
        (3, 7),
        (4, 5),
        (6, 7),
        (4, 6),
        (5, 7),
    ];
    let (min, max) = (bound.min, bound.max);
    let corners = [
        Vec3::new(min.x, min.y, min.z),
        Vec3::new(max.x, min.y, min.z),
        Vec3::new(min.x, max.y, min.z),
        Vec3::new(max.x, max.y, min.z),
        Vec3::new(min.x, min.y, max.z),
        Vec3::new(max.x, min.y, max.z),
        Vec3::new(min.x, max.y, max.z),
        Vec3::new(max.x, max.y, max.z),
    ];
    let projected: Vec<_> = corners
        .iter()
        .map(|&c| project_to_screen(c, transform, image.width(), image.height()))
        .collect();
    for (a, b) in EDGES {
        if let (Some(pa), Some(pb)) = (projected[a], projected[b]) {
            image.draw_line(pa, pb, color);
        }
    }
}

/// Axis indices ordered by descending extent.
fn sorted_axes(extent: Vec3) -> [usize; 3] {
    let mut ext = [extent.x, extent.y, extent.z];
    let mut res = [0usize, 1, 2];
    if ext[2] > ext[1] {
        ext.swap(2, 1);
        res.swap(2, 1);
    }
    if ext[1] > ext[0] {
        ext.swap(1, 0);
        res.swap(1, 0);
    }
    if ext[2] > ext[1] {
        ext.swap(2, 1);
        res.swap(2, 1);
    }
    res
}
