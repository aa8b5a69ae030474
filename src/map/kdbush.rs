/// Static 2D KD-tree over projected points. Ids are the positions of the points
/// in the slice the index was built from.
#[derive(Debug, Clone)]
pub(crate) struct KdIndex {
    entries: Vec<Entry>,
    node_size: usize,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    x: f64,
    y: f64,
    id: usize,
}

impl Entry {
    fn axis(&self, axis: usize) -> f64 {
        if axis == 0 {
            self.x
        } else {
            self.y
        }
    }
}

impl KdIndex {
    pub(crate) fn new(points: impl IntoIterator<Item = (f64, f64)>, node_size: usize) -> Self {
        let entries: Vec<Entry> = points
            .into_iter()
            .enumerate()
            .map(|(id, (x, y))| Entry { x, y, id })
            .collect();
        let mut index = Self {
            entries,
            node_size: node_size.max(1),
        };

        if !index.entries.is_empty() {
            let last = index.entries.len() - 1;
            index.sort(0, last, 0);
        }

        index
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }

    // Every range [left, right] ends up ordered so that entries before the
    // median are <= it on `axis` and entries after are >= it.
    fn sort(&mut self, left: usize, right: usize, axis: usize) {
        if right - left <= self.node_size {
            return;
        }

        self.entries[left..=right].sort_unstable_by(|a, b| a.axis(axis).total_cmp(&b.axis(axis)));

        let median = (left + right) >> 1;
        self.sort(left, median - 1, 1 - axis);
        self.sort(median + 1, right, 1 - axis);
    }

    /// Ids of all points inside the axis-aligned box.
    pub(crate) fn range(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<usize> {
        let inside = |e: &Entry| e.x >= min_x && e.x <= max_x && e.y >= min_y && e.y <= max_y;

        self.search(inside, |axis| {
            if axis == 0 {
                (min_x, max_x)
            } else {
                (min_y, max_y)
            }
        })
    }

    /// Ids of all points within `radius` of `(qx, qy)`.
    pub(crate) fn within(&self, qx: f64, qy: f64, radius: f64) -> Vec<usize> {
        let r2 = radius * radius;
        let inside = |e: &Entry| {
            let dx = e.x - qx;
            let dy = e.y - qy;
            dx * dx + dy * dy <= r2
        };

        self.search(inside, |axis| {
            if axis == 0 {
                (qx - radius, qx + radius)
            } else {
                (qy - radius, qy + radius)
            }
        })
    }

    fn search(
        &self,
        inside: impl Fn(&Entry) -> bool,
        extent: impl Fn(usize) -> (f64, f64),
    ) -> Vec<usize> {
        let mut result = Vec::new();

        if self.entries.is_empty() {
            return result;
        }

        let mut stack = vec![(0, self.entries.len() - 1, 0)];

        while let Some((left, right, axis)) = stack.pop() {
            if right - left <= self.node_size {
                result.extend(
                    self.entries[left..=right]
                        .iter()
                        .filter(|&entry| inside(entry))
                        .map(|entry| entry.id),
                );
                continue;
            }

            let median = (left + right) >> 1;
            let entry = &self.entries[median];

            if inside(entry) {
                result.push(entry.id);
            }

            let value = entry.axis(axis);
            let (low, high) = extent(axis);

            if low <= value {
                stack.push((left, median - 1, 1 - axis));
            }
            if high >= value {
                stack.push((median + 1, right, 1 - axis));
            }
        }

        result
    }
}
