//! Chunking strategies: greedy size/cohesion growth and breakpoint detection.

use std::ops::Range;

use semchunk_core::config::{BreakpointType, ChunkingConfig, CohesionMeasure, StrategyKind};
use semchunk_core::Vector;

use super::pooling::{blend, cosine, weighted_mean};
use super::types::{join_cost, Sentence, SubChunk};
use crate::error::ChunkingError;

/// How an oversized section is partitioned into sub-chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkingStrategy {
    /// Greedy growth bounded by size, cut early on a cohesion drop.
    SizeAndCohesion,
    /// Greedy growth bounded by size only.
    TokenBudgetOnly,
    /// Cut where the distance between neighbouring sentence windows is an outlier.
    BreakpointPercentile,
}

impl From<StrategyKind> for ChunkingStrategy {
    fn from(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::SizeAndCohesion => Self::SizeAndCohesion,
            StrategyKind::TokenBudgetOnly => Self::TokenBudgetOnly,
            StrategyKind::BreakpointPercentile => Self::BreakpointPercentile,
        }
    }
}

impl ChunkingStrategy {
    /// Partition `sentences` into ordered sub-chunks.
    ///
    /// `sizes[i]` is the size of `sentences[i]` under the configured unit and
    /// doubles as its pooling weight; `vectors[i]` is its embedding.
    pub fn split(
        &self,
        sentences: &[Sentence],
        sizes: &[usize],
        vectors: &[Vector],
        config: &ChunkingConfig,
    ) -> Result<Vec<SubChunk>, ChunkingError> {
        if sizes.len() != sentences.len() || vectors.len() != sentences.len() {
            return Err(ChunkingError::InputMismatch(format!(
                "{} sentences, {} sizes, {} vectors",
                sentences.len(),
                sizes.len(),
                vectors.len()
            )));
        }
        if sentences.is_empty() {
            return Ok(Vec::new());
        }

        let input = Input {
            sentences,
            sizes,
            vectors,
            join: join_cost(config.size_unit),
        };
        let ranges = match self {
            Self::SizeAndCohesion => greedy(&input, config, true)?,
            Self::TokenBudgetOnly => greedy(&input, config, false)?,
            Self::BreakpointPercentile => breakpoints(&input, config)?,
        };
        ranges.into_iter().map(|r| input.close(r)).collect()
    }
}

struct Input<'a> {
    sentences: &'a [Sentence],
    sizes: &'a [usize],
    vectors: &'a [Vector],
    join: usize,
}

impl Input<'_> {
    fn weights(&self, range: Range<usize>) -> Vec<f32> {
        self.sizes[range].iter().map(|&s| s as f32).collect()
    }

    fn pooled(&self, range: Range<usize>) -> Result<Option<Vector>, ChunkingError> {
        weighted_mean(&self.vectors[range.clone()], &self.weights(range))
    }

    /// Size of the sentences in `range` joined by single spaces.
    fn span_size(&self, range: Range<usize>) -> usize {
        let count = range.len();
        self.sizes[range].iter().sum::<usize>() + self.join * count.saturating_sub(1)
    }

    fn close(&self, range: Range<usize>) -> Result<SubChunk, ChunkingError> {
        let text = self.sentences[range.clone()]
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let vector = self.pooled(range)?.unwrap_or_default();
        Ok(SubChunk {
            text: text.trim().to_string(),
            vector,
        })
    }
}

// ── Greedy growth ───────────────────────────────────────────────────────────

/// Running state of the chunk being grown: a contiguous run of sentences,
/// the first `seeded` of which are overlap repeated from the previous chunk.
struct Accumulator {
    start: usize,
    end: usize,
    seeded: usize,
    total: usize,
    weight: f32,
    centroid: Option<Vector>,
}

impl Accumulator {
    fn empty(at: usize) -> Self {
        Self {
            start: at,
            end: at,
            seeded: 0,
            total: 0,
            weight: 0.0,
            centroid: None,
        }
    }

    /// Pre-seed with the overlap run `range`.
    fn seeded(input: &Input<'_>, range: Range<usize>) -> Result<Self, ChunkingError> {
        if range.is_empty() {
            return Ok(Self::empty(range.end));
        }
        Ok(Self {
            start: range.start,
            end: range.end,
            seeded: range.len(),
            total: input.span_size(range.clone()),
            weight: input.weights(range.clone()).iter().sum(),
            centroid: input.pooled(range)?,
        })
    }

    fn is_empty(&self) -> bool {
        self.end == self.start
    }

    fn fresh(&self) -> usize {
        self.end - self.start - self.seeded
    }

    fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    fn admit(&mut self, input: &Input<'_>, centroid: Vector) {
        let size = input.sizes[self.end];
        self.total += if self.is_empty() { size } else { size + input.join };
        self.weight += size as f32;
        self.centroid = Some(centroid);
        self.end += 1;
    }

    /// Forget the oldest overlap sentence.
    fn shed_seed(&mut self, input: &Input<'_>) -> Result<(), ChunkingError> {
        let rest = self.start + 1..self.start + self.seeded;
        let end = self.end;
        *self = Self::seeded(input, rest)?;
        debug_assert_eq!(self.end, end);
        Ok(())
    }
}

fn greedy(
    input: &Input<'_>,
    config: &ChunkingConfig,
    cohesion: bool,
) -> Result<Vec<Range<usize>>, ChunkingError> {
    let n = input.sentences.len();
    let mut out = Vec::new();
    let mut acc = Accumulator::empty(0);

    while acc.end < n {
        let i = acc.end;
        let size = input.sizes[i];
        let vector = &input.vectors[i];

        if acc.is_empty() {
            acc.admit(input, vector.clone());
            continue;
        }
        let centroid = acc.centroid.as_deref().unwrap_or_default();

        let will_exceed = acc.total + input.join + size > config.max_chunk_size;
        if will_exceed && acc.fresh() == 0 {
            // Overlap alone leaves no room for the next sentence.
            acc.shed_seed(input)?;
            continue;
        }

        let new_centroid = blend(centroid, acc.weight, vector, size as f32);
        let semantic_cut = cohesion && acc.fresh() > 0 && {
            let sim_after = cosine(&new_centroid, vector);
            let drop = match config.cohesion_measure {
                CohesionMeasure::Delta => cosine(centroid, vector) - sim_after,
                CohesionMeasure::Distance => 1.0 - sim_after,
            };
            drop > config.cohesion_drop_threshold && acc.total >= config.min_chunk_size
        };

        if will_exceed || semantic_cut {
            out.push(acc.range());
            let seed_start = overlap_start(input, acc.range(), config.overlap_budget);
            acc = Accumulator::seeded(input, seed_start..i)?;
            continue;
        }
        acc.admit(input, new_centroid);
    }

    if !acc.is_empty() && acc.fresh() > 0 {
        out.push(acc.range());
    }
    Ok(out)
}

/// Walk back from the end of `closed` until `budget` is covered or the start
/// of the closed chunk is reached.
fn overlap_start(input: &Input<'_>, closed: Range<usize>, budget: usize) -> usize {
    let mut start = closed.end;
    let mut covered = 0usize;
    while start > closed.start && covered < budget {
        start -= 1;
        covered += input.sizes[start];
    }
    start
}

// ── Breakpoints ─────────────────────────────────────────────────────────────

fn breakpoints(
    input: &Input<'_>,
    config: &ChunkingConfig,
) -> Result<Vec<Range<usize>>, ChunkingError> {
    let n = input.sentences.len();
    let buffer = config.breakpoint_buffer_size;

    let windows = (0..n)
        .map(|i| {
            let range = i.saturating_sub(buffer)..(i + buffer + 1).min(n);
            Ok(input.pooled(range)?.unwrap_or_default())
        })
        .collect::<Result<Vec<_>, ChunkingError>>()?;
    let distances: Vec<f32> = windows
        .windows(2)
        .map(|pair| 1.0 - cosine(&pair[0], &pair[1]))
        .collect();
    let threshold = breakpoint_threshold(
        &distances,
        config.breakpoint_type,
        config.effective_breakpoint_amount(),
    );

    let mut out = Vec::new();
    let mut start = 0usize;
    let mut total = input.sizes[0];
    for i in 1..n {
        let size = input.sizes[i];
        let outlier = threshold.is_some_and(|t| distances[i - 1] > t);
        let will_exceed = total + input.join + size > config.max_chunk_size;
        if will_exceed || (outlier && total >= config.min_chunk_size) {
            out.push(start..i);
            start = i;
            total = size;
        } else {
            total += input.join + size;
        }
    }
    out.push(start..n);
    Ok(out)
}

/// Distance above which a neighbour pair is treated as a topic shift.
fn breakpoint_threshold(distances: &[f32], kind: BreakpointType, amount: f32) -> Option<f32> {
    if distances.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = distances.iter().map(|&d| f64::from(d)).collect();
    sorted.sort_by(f64::total_cmp);
    let amount = f64::from(amount);

    let threshold = match kind {
        BreakpointType::Percentile => percentile(&sorted, amount),
        BreakpointType::StandardDeviation => {
            let mean = mean(&sorted);
            let variance =
                sorted.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / sorted.len() as f64;
            mean + amount * variance.sqrt()
        }
        BreakpointType::Interquartile => {
            let iqr = percentile(&sorted, 75.0) - percentile(&sorted, 25.0);
            mean(&sorted) + amount * iqr
        }
    };
    Some(threshold as f32)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Linear-interpolated percentile of an ascending, non-empty slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
