//! Partitioning of a requested image count into batches.

use crate::error::{ImagineError, Result};

/// Ordered batch sizes summing to the requested total.
///
/// Every entry is in `1..=batch_size`; only the last entry may be smaller than
/// `batch_size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    sizes: Vec<u32>,
}

impl BatchPlan {
    /// Plans `total` images in batches of at most `batch_size`.
    ///
    /// # Examples
    ///
    /// ```
    /// use imagine_core::batch::BatchPlan;
    ///
    /// let plan = BatchPlan::new(7, 3).unwrap();
    /// assert_eq!(plan.sizes(), &[3, 3, 1]);
    /// ```
    pub fn new(total: u32, batch_size: u32) -> Result<Self> {
        if total == 0 {
            return Err(ImagineError::validation(
                "At least one image must be requested.",
            ));
        }
        if batch_size == 0 {
            return Err(ImagineError::validation("Batch size must be at least 1."));
        }

        let mut sizes = vec![batch_size; (total / batch_size) as usize];
        let remainder = total % batch_size;
        if remainder != 0 {
            sizes.push(remainder);
        }
        Ok(Self { sizes })
    }

    pub fn sizes(&self) -> &[u32] {
        &self.sizes
    }

    /// Number of batches.
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Total number of images across all batches.
    pub fn total(&self) -> u32 {
        self.sizes.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.sizes.iter().copied()
    }
}

impl IntoIterator for BatchPlan {
    type Item = u32;
    type IntoIter = std::vec::IntoIter<u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.sizes.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_examples() {
        assert_eq!(BatchPlan::new(7, 3).unwrap().sizes(), &[3, 3, 1]);
        assert_eq!(BatchPlan::new(9, 3).unwrap().sizes(), &[3, 3, 3]);
        assert_eq!(BatchPlan::new(1, 5).unwrap().sizes(), &[1]);
    }

    #[test]
    fn test_plan_rejects_zero() {
        assert!(BatchPlan::new(0, 3).unwrap_err().is_validation());
        assert!(BatchPlan::new(3, 0).unwrap_err().is_validation());
    }

    #[test]
    fn test_total_and_len() {
        let plan = BatchPlan::new(30, 4).unwrap();
        assert_eq!(plan.total(), 30);
        assert_eq!(plan.len(), 8);
        assert_eq!(plan.sizes().last(), Some(&2));
    }
}
