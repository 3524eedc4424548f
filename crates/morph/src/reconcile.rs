use glam::Vec3;
use rand::Rng;
use std::collections::BTreeMap;

/// Errors from reconciling morph sources or driving the controller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MorphError {
    #[error("no morph sources supplied")]
    NoSources,
    #[error("morph source '{0}' has no points")]
    EmptySource(String),
    #[error("morph source '{name}' has item size {actual}, expected {expected}")]
    ItemSizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("buffer of {len} floats is not a whole number of {item_size}-float items")]
    RaggedBuffer { len: usize, item_size: usize },
    #[error("unknown morph target '{0}'")]
    UnknownTarget(String),
    #[error("invalid morph config: {0}")]
    InvalidConfig(String),
}

/// Flat float buffer of fixed-size items, e.g. three floats per position.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeBuffer {
    item_size: usize,
    array: Vec<f32>,
}

impl AttributeBuffer {
    pub fn new(item_size: usize, array: Vec<f32>) -> Result<Self, MorphError> {
        if item_size == 0 || array.len() % item_size != 0 {
            return Err(MorphError::RaggedBuffer {
                len: array.len(),
                item_size,
            });
        }
        Ok(Self { item_size, array })
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        Self {
            item_size: 3,
            array: points.iter().flat_map(|p| p.to_array()).collect(),
        }
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Number of items.
    pub fn count(&self) -> usize {
        self.array.len() / self.item_size
    }

    pub fn array(&self) -> &[f32] {
        &self.array
    }

    pub fn item(&self, index: usize) -> &[f32] {
        let start = index * self.item_size;
        &self.array[start..start + self.item_size]
    }

    /// Items as points. Only meaningful for three-float buffers.
    pub fn points(&self) -> impl Iterator<Item = Vec3> + '_ {
        (self.item_size == 3)
            .then(|| self.array.chunks_exact(3))
            .into_iter()
            .flatten()
            .map(Vec3::from_slice)
    }

    /// Component-wise `a + (b - a) * t`. Both buffers must have equal shape.
    pub fn lerp(&self, other: &Self, t: f32) -> Result<Self, MorphError> {
        if self.item_size != other.item_size || self.array.len() != other.array.len() {
            return Err(MorphError::ItemSizeMismatch {
                name: "lerp".into(),
                expected: self.item_size,
                actual: other.item_size,
            });
        }
        let array = self
            .array
            .iter()
            .zip(&other.array)
            .map(|(a, b)| a + (b - a) * t)
            .collect();
        Ok(Self {
            item_size: self.item_size,
            array,
        })
    }
}

/// Equal-length morph targets plus the per-slot size buffer they share.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    count: usize,
    positions: BTreeMap<String, AttributeBuffer>,
    sizes: Vec<f32>,
}

impl Reconciled {
    /// Items per target; the maximum over the inputs.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn get(&self, name: &str) -> Option<&AttributeBuffer> {
        self.positions.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.positions.keys().map(String::as_str)
    }

    pub fn positions(&self) -> &BTreeMap<String, AttributeBuffer> {
        &self.positions
    }

    /// One random factor in `[0, 1)` per slot, identical for every target.
    pub fn sizes(&self) -> &[f32] {
        &self.sizes
    }
}

/// Pad every source up to the largest source's item count.
///
/// Slots past a source's own count receive copies of items drawn uniformly,
/// with replacement, from that source's original items. Original items keep
/// their values and indices. Sources are visited in name order, so a seeded
/// `rng` reproduces the result.
pub fn reconcile<R: Rng + ?Sized>(
    sets: &BTreeMap<String, AttributeBuffer>,
    rng: &mut R,
) -> Result<Reconciled, MorphError> {
    let Some(first) = sets.values().next() else {
        return Err(MorphError::NoSources);
    };
    let item_size = first.item_size();
    for (name, set) in sets {
        if set.item_size() != item_size {
            return Err(MorphError::ItemSizeMismatch {
                name: name.clone(),
                expected: item_size,
                actual: set.item_size(),
            });
        }
        if set.count() == 0 {
            return Err(MorphError::EmptySource(name.clone()));
        }
    }

    let count = sets.values().map(AttributeBuffer::count).max().unwrap_or(0);
    let mut positions = BTreeMap::new();
    for (name, set) in sets {
        let original = set.count();
        let mut array = Vec::with_capacity(count * item_size);
        array.extend_from_slice(set.array());
        for _ in original..count {
            let j = rng.gen_range(0..original);
            array.extend_from_slice(set.item(j));
        }
        tracing::debug!(source = %name, original, padded = count - original, "morph source reconciled");
        positions.insert(name.clone(), AttributeBuffer { item_size, array });
    }

    let sizes = (0..count).map(|_| rng.gen_range(0.0..1.0)).collect();
    tracing::info!(sources = sets.len(), count, "morph targets reconciled");
    Ok(Reconciled {
        count,
        positions,
        sizes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn line(n: usize, x: f32) -> AttributeBuffer {
        let points: Vec<Vec3> = (0..n).map(|i| Vec3::new(x, i as f32, 0.0)).collect();
        AttributeBuffer::from_points(&points)
    }

    fn sets(entries: &[(&str, AttributeBuffer)]) -> BTreeMap<String, AttributeBuffer> {
        entries
            .iter()
            .map(|(n, b)| (n.to_string(), b.clone()))
            .collect()
    }

    #[test]
    fn pads_from_own_source_only() {
        let a = line(3, 1.0);
        let b = line(7, -1.0);
        let input = sets(&[("A", a.clone()), ("B", b.clone())]);
        let mut rng = StdRng::seed_from_u64(5);
        let out = reconcile(&input, &mut rng).unwrap();

        assert_eq!(out.count(), 7);
        let ra = out.get("A").unwrap();
        let rb = out.get("B").unwrap();
        assert_eq!(ra.count(), 7);
        assert_eq!(rb, &b);
        assert_eq!(&ra.array()[..9], a.array());
        for i in 3..7 {
            let item = ra.item(i);
            assert!((0..3).any(|j| a.item(j) == item), "slot {i} not from A");
            assert!((0..7).all(|j| b.item(j) != item), "slot {i} leaked from B");
        }
    }

    #[test]
    fn equal_lengths_are_unchanged() {
        let input = sets(&[("A", line(4, 1.0)), ("B", line(4, 2.0))]);
        let mut rng = StdRng::seed_from_u64(0);
        let out = reconcile(&input, &mut rng).unwrap();
        assert_eq!(out.positions(), &input);
        // reconciling the output again changes nothing either
        let again = reconcile(out.positions(), &mut rng).unwrap();
        assert_eq!(again.positions(), out.positions());
    }

    #[test]
    fn sizes_are_shared_per_slot() {
        let input = sets(&[("A", line(2, 0.0)), ("B", line(5, 1.0)), ("C", line(3, 2.0))]);
        let mut rng = StdRng::seed_from_u64(1);
        let out = reconcile(&input, &mut rng).unwrap();
        assert_eq!(out.sizes().len(), 5);
        assert!(out.sizes().iter().all(|s| (0.0..1.0).contains(s)));
        assert!(out.positions().values().all(|b| b.count() == 5));
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let input = sets(&[("A", line(2, 0.0)), ("B", line(9, 1.0))]);
        let a = reconcile(&input, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = reconcile(&input, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_input_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            reconcile(&BTreeMap::new(), &mut rng),
            Err(MorphError::NoSources)
        );
    }

    #[test]
    fn empty_source_is_rejected() {
        let input = sets(&[("A", line(0, 0.0)), ("B", line(3, 0.0))]);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            reconcile(&input, &mut rng),
            Err(MorphError::EmptySource("A".into()))
        );
    }

    #[test]
    fn mismatched_item_size_is_rejected() {
        let uv = AttributeBuffer::new(2, vec![0.0; 8]).unwrap();
        let input = sets(&[("A", line(3, 0.0)), ("B", uv)]);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            reconcile(&input, &mut rng),
            Err(MorphError::ItemSizeMismatch { expected: 3, actual: 2, .. })
        ));
    }

    #[test]
    fn ragged_buffer_is_rejected() {
        assert_eq!(
            AttributeBuffer::new(3, vec![0.0; 7]),
            Err(MorphError::RaggedBuffer { len: 7, item_size: 3 })
        );
    }

    #[test]
    fn lerp_blends_items() {
        let a = AttributeBuffer::from_points(&[Vec3::ZERO]);
        let b = AttributeBuffer::from_points(&[Vec3::new(2.0, 4.0, -2.0)]);
        let mid = a.lerp(&b, 0.5).unwrap();
        assert_eq!(mid.array(), &[1.0, 2.0, -1.0]);
    }

    #[test]
    fn points_need_three_float_items() {
        let uv = AttributeBuffer::new(2, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(uv.points().count(), 0);
        let xyz = AttributeBuffer::new(3, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let points: Vec<Vec3> = xyz.points().collect();
        assert_eq!(points, vec![Vec3::new(0.0, 1.0, 2.0), Vec3::new(3.0, 4.0, 5.0)]);
    }
}
