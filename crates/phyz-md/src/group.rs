//! Particle groups.

use crate::{ParticleData, Result};
use std::ops::Range;

/// Sorted, duplicate-free set of particle indices.
///
/// Iteration order is ascending index; it carries no meaning beyond that.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticleGroup {
    members: Vec<usize>,
}

impl ParticleGroup {
    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Self {
        let mut members: Vec<usize> = indices.into_iter().collect();
        members.sort_unstable();
        members.dedup();
        Self { members }
    }

    /// Every particle in the store.
    pub fn all(pdata: &ParticleData) -> Self {
        Self::range(0..pdata.n())
    }

    pub fn range(range: Range<usize>) -> Self {
        Self {
            members: range.collect(),
        }
    }

    /// Particles whose type id is in `types`.
    pub fn from_types(pdata: &ParticleData, types: &[u32]) -> Self {
        Self::from_indices(
            pdata
                .type_id
                .iter()
                .enumerate()
                .filter(|(_, t)| types.contains(t))
                .map(|(i, _)| i),
        )
    }

    /// Particles with the given tags, resolved to current indices.
    pub fn from_tags(pdata: &ParticleData, tags: &[u32]) -> Result<Self> {
        let indices = tags
            .iter()
            .map(|&t| pdata.index_of(t))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_indices(indices))
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.members.binary_search(&index).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.members.iter().copied()
    }

    pub fn intersection(&self, other: &ParticleGroup) -> ParticleGroup {
        let mut members = Vec::new();
        self.merge_walk(other, |i| members.push(i));
        ParticleGroup { members }
    }

    pub fn intersection_len(&self, other: &ParticleGroup) -> usize {
        let mut n = 0;
        self.merge_walk(other, |_| n += 1);
        n
    }

    fn merge_walk(&self, other: &ParticleGroup, mut hit: impl FnMut(usize)) {
        let (a, b) = (&self.members, &other.members);
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    hit(a[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
    }
}

impl<'a> IntoIterator for &'a ParticleGroup {
    type Item = usize;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, usize>>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Particle;
    use phyz_math::{BoxDim, Vec3};

    #[test]
    fn test_from_indices_dedups() {
        let g = ParticleGroup::from_indices([5, 1, 3, 1, 5]);
        assert_eq!(g.members(), &[1, 3, 5]);
        assert!(g.contains(3));
        assert!(!g.contains(2));
    }

    #[test]
    fn test_intersection() {
        let a = ParticleGroup::range(0..10);
        let b = ParticleGroup::from_indices([8, 9, 10, 11]);
        assert_eq!(a.intersection(&b).members(), &[8, 9]);
        assert_eq!(a.intersection_len(&b), 2);
        assert_eq!(a.intersection_len(&ParticleGroup::range(10..20)), 0);
    }

    #[test]
    fn test_types_and_tags() {
        let mut pdata = ParticleData::new(BoxDim::cube(10.0));
        for i in 0..6 {
            pdata.add_particle(Particle::new(Vec3::zeros(), Vec3::zeros(), 1.0, i % 3));
        }
        let g = ParticleGroup::from_types(&pdata, &[0, 2]);
        assert_eq!(g.members(), &[0, 2, 3, 5]);

        pdata.reorder(&[5, 4, 3, 2, 1, 0]).unwrap();
        let g = ParticleGroup::from_tags(&pdata, &[0, 1]).unwrap();
        assert_eq!(g.members(), &[4, 5]);
        assert!(ParticleGroup::from_tags(&pdata, &[42]).is_err());
    }
}
