//! Length-aware batching of padded token tensors.
//!
//! Rows are sorted by their real length, cut into chunks of `bsize`, and each
//! chunk is trimmed to its own longest row. Grouping similar lengths first means
//! a chunk of short documents does not pay for the padding of one long document.
//! The [`ReverseIndex`] scatters per-row outputs back to input order.
//!
//! Every [`TokenBatch`] is right-padded: a row's real tokens form a prefix and
//! its mask is a run of ones followed by zeros.

use std::iter;

use candle_core::{Device, Tensor};

use crate::core::{RerankError, Result};

/// A rectangular grid of token ids and its attention mask, both `u32` and of
/// identical `(rows, width)` shape.
#[derive(Debug, Clone)]
pub struct TokenBatch {
    pub ids: Tensor,
    pub mask: Tensor,
}

impl TokenBatch {
    pub fn new(ids: Tensor, mask: Tensor) -> Result<Self> {
        let ids_shape = ids.dims2()?;
        let mask_shape = mask.dims2()?;
        if ids_shape != mask_shape {
            return Err(RerankError::InputShape(format!(
                "ids shape {ids_shape:?} does not match mask shape {mask_shape:?}"
            )));
        }
        Ok(Self { ids, mask })
    }

    /// Right-pad `rows` with `pad_id` to the longest row.
    pub fn from_rows(rows: &[Vec<u32>], pad_id: u32, device: &Device) -> Result<Self> {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        Self::padded(rows, width, pad_id, device)
    }

    /// Right-pad `rows` with `fill_id` to exactly `width` columns. Rows longer
    /// than `width` are rejected.
    pub(crate) fn padded(rows: &[Vec<u32>], width: usize, fill_id: u32, device: &Device) -> Result<Self> {
        let mut ids = Vec::with_capacity(rows.len() * width);
        let mut mask = Vec::with_capacity(rows.len() * width);
        for row in rows {
            let padding = width.checked_sub(row.len()).ok_or_else(|| {
                RerankError::InputShape(format!("row of {} tokens exceeds width {width}", row.len()))
            })?;
            ids.extend_from_slice(row);
            ids.extend(iter::repeat(fill_id).take(padding));
            mask.extend(iter::repeat(1u32).take(row.len()));
            mask.extend(iter::repeat(0u32).take(padding));
        }
        let shape = (rows.len(), width);
        Ok(Self {
            ids: Tensor::from_vec(ids, shape, device)?,
            mask: Tensor::from_vec(mask, shape, device)?,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.dims().first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn width(&self) -> usize {
        self.ids.dims().get(1).copied().unwrap_or(0)
    }

    /// Number of real tokens in each row, read from the mask.
    pub fn lengths(&self) -> Result<Vec<usize>> {
        Ok(self
            .mask
            .to_vec2::<u32>()?
            .iter()
            .map(|row| row.iter().filter(|&&m| m != 0).count())
            .collect())
    }

    /// The unpadded token ids of every row.
    pub fn rows(&self) -> Result<Vec<Vec<u32>>> {
        let lengths = self.lengths()?;
        Ok(self
            .ids
            .to_vec2::<u32>()?
            .into_iter()
            .zip(lengths)
            .map(|(mut row, len)| {
                row.truncate(len);
                row
            })
            .collect())
    }

    fn select_rows(&self, order: &[usize]) -> Result<Self> {
        let order: Vec<u32> = order.iter().map(|&i| i as u32).collect();
        let index = Tensor::new(order.as_slice(), self.ids.device())?;
        Ok(Self {
            ids: self.ids.index_select(&index, 0)?,
            mask: self.mask.index_select(&index, 0)?,
        })
    }

    fn chunk(&self, start: usize, len: usize, width: usize) -> Result<Self> {
        Ok(Self {
            ids: self.ids.narrow(0, start, len)?.narrow(1, 0, width)?.contiguous()?,
            mask: self.mask.narrow(0, start, len)?.narrow(1, 0, width)?.contiguous()?,
        })
    }
}

/// For every original row, its position in the length-sorted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseIndex(Vec<usize>);

impl ReverseIndex {
    pub fn identity(len: usize) -> Self {
        Self((0..len).collect())
    }

    /// Build from a sort order, where `order[pos]` is the original row placed at `pos`.
    ///
    /// `order` must be a permutation of `0..order.len()`.
    pub fn from_sort_order(order: &[usize]) -> Result<Self> {
        let mut reverse = vec![usize::MAX; order.len()];
        for (pos, &original) in order.iter().enumerate() {
            match reverse.get_mut(original) {
                Some(slot) if *slot == usize::MAX => *slot = pos,
                _ => {
                    return Err(RerankError::InputShape(format!(
                        "sort order {order:?} is not a permutation of 0..{}",
                        order.len()
                    )))
                }
            }
        }
        Ok(Self(reverse))
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_identity(&self) -> bool {
        self.0.iter().enumerate().all(|(i, &p)| i == p)
    }

    /// Put outputs produced in sorted order back into input order.
    pub fn restore<T: Clone>(&self, sorted: &[T]) -> Result<Vec<T>> {
        self.check_len(sorted.len())?;
        Ok(self.0.iter().map(|&pos| sorted[pos].clone()).collect())
    }

    /// Tensor version of [`ReverseIndex::restore`] along the first dimension.
    pub fn restore_rows(&self, sorted: &Tensor) -> Result<Tensor> {
        self.check_len(sorted.dims().first().copied().unwrap_or(0))?;
        let index: Vec<u32> = self.0.iter().map(|&p| p as u32).collect();
        let index = Tensor::new(index.as_slice(), sorted.device())?;
        Ok(sorted.index_select(&index, 0)?)
    }

    fn check_len(&self, found: usize) -> Result<()> {
        if found != self.0.len() {
            return Err(RerankError::InputShape(format!(
                "reverse index covers {} rows but {found} were produced",
                self.0.len()
            )));
        }
        Ok(())
    }
}

/// Sub-batches ready for the encoder, plus the way back to input order.
#[derive(Debug, Clone)]
pub struct BatchedTokens {
    pub batches: Vec<TokenBatch>,
    pub reverse_index: ReverseIndex,
}

impl BatchedTokens {
    pub fn empty() -> Self {
        Self {
            batches: Vec::new(),
            reverse_index: ReverseIndex::identity(0),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.reverse_index.len()
    }

    /// Unpadded rows in the original input order.
    pub fn restore_rows(&self) -> Result<Vec<Vec<u32>>> {
        let mut sorted = Vec::with_capacity(self.num_rows());
        for batch in &self.batches {
            sorted.extend(batch.rows()?);
        }
        self.reverse_index.restore(&sorted)
    }
}

/// Stable sort of the rows by real length.
///
/// When everything fits in a single chunk the batch is returned as is with an
/// identity index, since sorting could not reduce padding.
pub fn sort_by_length(batch: &TokenBatch, bsize: usize) -> Result<(TokenBatch, ReverseIndex)> {
    if batch.len() <= bsize {
        return Ok((batch.clone(), ReverseIndex::identity(batch.len())));
    }

    let lengths = batch.lengths()?;
    let mut order: Vec<usize> = (0..lengths.len()).collect();
    order.sort_by_key(|&row| lengths[row]);

    let sorted = batch.select_rows(&order)?;
    Ok((sorted, ReverseIndex::from_sort_order(&order)?))
}

/// Cut `batch` into consecutive chunks of `bsize` rows, each trimmed to its own
/// longest row. A `bsize` of zero yields a single chunk.
pub fn split_into_batches(batch: &TokenBatch, bsize: usize) -> Result<Vec<TokenBatch>> {
    let total = batch.len();
    if total == 0 {
        return Ok(Vec::new());
    }
    let bsize = if bsize == 0 { total } else { bsize };

    let lengths = batch.lengths()?;
    let mut batches = Vec::with_capacity(total.div_ceil(bsize));
    for start in (0..total).step_by(bsize) {
        let len = bsize.min(total - start);
        let width = lengths[start..start + len].iter().copied().max().unwrap_or(0);
        batches.push(batch.chunk(start, len, width)?);
    }
    Ok(batches)
}

/// Sort, chunk and re-pad. Without a positive `bsize` the batch is passed through
/// whole in its original order.
pub fn batch_by_length(batch: TokenBatch, bsize: Option<usize>) -> Result<BatchedTokens> {
    if batch.is_empty() {
        return Ok(BatchedTokens::empty());
    }
    match bsize.filter(|&b| b > 0) {
        None => {
            let reverse_index = ReverseIndex::identity(batch.len());
            Ok(BatchedTokens {
                batches: vec![batch],
                reverse_index,
            })
        }
        Some(bsize) => {
            let (sorted, reverse_index) = sort_by_length(&batch, bsize)?;
            let batches = split_into_batches(&sorted, bsize)?;
            Ok(BatchedTokens {
                batches,
                reverse_index,
            })
        }
    }
}
