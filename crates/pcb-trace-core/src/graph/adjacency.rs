/// Compressed adjacency rows: row `i` is the slice `flat[offsets[i]..offsets[i + 1]]`.
#[derive(Clone, Debug)]
pub struct Csr<T> {
    offsets: Vec<u32>, // len = rows + 1
    flat: Vec<T>,
}

impl<T: Copy> Csr<T> {
    /// Build from `(row, value)` pairs with a counting sort. Values keep their
    /// relative order within a row. Pairs whose row is out of range are
    /// dropped.
    pub fn from_pairs(rows: usize, pairs: &[(u32, T)]) -> Self {
        let mut offsets = vec![0u32; rows + 1];
        for &(row, _) in pairs {
            if (row as usize) < rows {
                offsets[row as usize + 1] += 1;
            }
        }
        for i in 0..rows {
            offsets[i + 1] += offsets[i];
        }

        let mut cursor: Vec<u32> = offsets[..rows].to_vec();
        let mut slots: Vec<Option<T>> = vec![None; offsets[rows] as usize];
        for &(row, value) in pairs {
            if let Some(at) = cursor.get_mut(row as usize) {
                slots[*at as usize] = Some(value);
                *at += 1;
            }
        }

        Self {
            offsets,
            flat: slots.into_iter().flatten().collect(),
        }
    }

    pub fn row(&self, i: usize) -> Option<&[T]> {
        if i + 1 >= self.offsets.len() {
            return None;
        }
        let a = self.offsets[i] as usize;
        let b = self.offsets[i + 1] as usize;
        Some(&self.flat[a..b])
    }
}
