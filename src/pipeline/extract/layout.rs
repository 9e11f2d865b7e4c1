//! Text-block grouping, same-kind merging, layout scoring and the shape summary.

use crate::config::{ExtractorConfig, LayoutWeights};
use crate::models::{
    BoundingBox, LogoIntegrity, Region, RegionKind, SealPosition, ShapeSummary, TextAlignment,
};

/// Line alignment spread (page units) that still counts as aligned.
const ALIGN_TOLERANCE: f32 = 0.01;

/// Decay length for alignment spread in the regularity score (page units).
const REGULARITY_SCALE: f32 = 0.02;

/// Decay length for emblem offset from a symmetric placement (page units).
const SYMMETRY_SCALE: f32 = 0.1;

/// Single text line within this distance of the page centre reads as centred.
const SINGLE_LINE_CENTER_TOLERANCE: f32 = 0.05;

/// Logo confidence needed for "intact" / "partially damaged".
const LOGO_INTACT: f32 = 0.7;
const LOGO_DAMAGED: f32 = 0.4;

/// A text line before grouping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextLine {
    pub bbox: BoundingBox,
    pub orientation_deg: f32,
    pub confidence: f32,
}

/// A text block and the lines it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub region: Region,
    pub lines: Vec<BoundingBox>,
}

// ═══════════════════════════════════════════════════════════
// Grouping and merging
// ═══════════════════════════════════════════════════════════

/// Join vertically adjacent, horizontally overlapping lines into blocks.
pub fn group_text_lines(lines: &[TextLine], config: &ExtractorConfig) -> Vec<TextBlock> {
    let mut sorted = lines.to_vec();
    sorted.sort_by_key(|l| (l.bbox.y, l.bbox.x, l.bbox.height, l.bbox.width));

    let mut parent: Vec<usize> = (0..sorted.len()).collect();
    for i in 0..sorted.len() {
        for j in i + 1..sorted.len() {
            if belong_together(&sorted[i].bbox, &sorted[j].bbox, config) {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[b.max(a)] = a.min(b);
                }
            }
        }
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut slot = vec![usize::MAX; sorted.len()];
    for i in 0..sorted.len() {
        let root = find(&mut parent, i);
        if slot[root] == usize::MAX {
            slot[root] = groups.len();
            groups.push(Vec::new());
        }
        groups[slot[root]].push(i);
    }

    groups
        .into_iter()
        .map(|members| {
            let n = members.len() as f32;
            let bbox = members
                .iter()
                .map(|&i| sorted[i].bbox)
                .reduce(|a, b| a.union(&b))
                .unwrap_or(sorted[members[0]].bbox);
            let orientation = members.iter().map(|&i| sorted[i].orientation_deg).sum::<f32>() / n;
            let confidence = members.iter().map(|&i| sorted[i].confidence).sum::<f32>() / n;
            TextBlock {
                region: Region::new(RegionKind::TextBlock, bbox, orientation, confidence),
                lines: members.iter().map(|&i| sorted[i].bbox).collect(),
            }
        })
        .collect()
}

fn belong_together(a: &BoundingBox, b: &BoundingBox, config: &ExtractorConfig) -> bool {
    let gap = a.y.max(b.y).saturating_sub(a.bottom().min(b.bottom()));
    let line_height = a.height.min(b.height) as f32;
    if gap as f32 > config.text_group_gap_factor * line_height {
        return false;
    }
    let overlap = a.right().min(b.right()).saturating_sub(a.x.max(b.x));
    let narrower = a.width.min(b.width).max(1);
    overlap as f32 / narrower as f32 >= config.text_min_overlap
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Merge same-kind regions overlapping more than `tolerance` until none do.
/// The merged region keeps the larger member's orientation and the higher
/// confidence.
pub fn merge_overlapping(mut regions: Vec<Region>, tolerance: f32) -> Vec<Region> {
    'restart: loop {
        for i in 0..regions.len() {
            for j in i + 1..regions.len() {
                let (a, b) = (&regions[i], &regions[j]);
                if a.kind != b.kind || a.bbox.overlap_fraction(&b.bbox) <= tolerance {
                    continue;
                }
                let orientation = if a.bbox.area() >= b.bbox.area() {
                    a.orientation_deg
                } else {
                    b.orientation_deg
                };
                let merged = Region::new(
                    a.kind,
                    a.bbox.union(&b.bbox),
                    orientation,
                    a.confidence.max(b.confidence),
                );
                regions[i] = merged;
                regions.remove(j);
                continue 'restart;
            }
        }
        return regions;
    }
}

// ═══════════════════════════════════════════════════════════
// Layout score
// ═══════════════════════════════════════════════════════════

/// Plausible region counts per kind, inclusive.
fn expected_count(kind: RegionKind) -> (usize, usize) {
    match kind {
        RegionKind::TextBlock => (1, 8),
        RegionKind::Seal => (0, 2),
        RegionKind::Logo => (0, 2),
        RegionKind::Border => (0, 1),
        RegionKind::Signature => (0, 3),
    }
}

/// Kind whose count falls outside its plausible range, with the excess.
pub fn implausible_counts(regions: &[Region]) -> Vec<(RegionKind, usize)> {
    RegionKind::ALL
        .iter()
        .filter_map(|&kind| {
            let count = regions.iter().filter(|r| r.kind == kind).count();
            let (lo, hi) = expected_count(kind);
            let excess = lo.saturating_sub(count) + count.saturating_sub(hi);
            (excess > 0).then_some((kind, excess))
        })
        .collect()
}

/// Structural plausibility, 0-100. Zero when there is no text at all.
pub fn layout_score(
    regions: &[Region],
    blocks: &[TextBlock],
    page_w: u32,
    page_h: u32,
    weights: &LayoutWeights,
) -> f32 {
    if blocks.is_empty() {
        return 0.0;
    }
    let count = count_plausibility(regions);
    let regularity = text_regularity(blocks, page_w);
    let symmetry = emblem_symmetry(regions, page_w, page_h);
    let total = weights.count + weights.regularity + weights.symmetry;
    let score = (weights.count * count + weights.regularity * regularity + weights.symmetry * symmetry)
        / total;
    (100.0 * score).clamp(0.0, 100.0)
}

fn count_plausibility(regions: &[Region]) -> f32 {
    let implausible = implausible_counts(regions);
    let factor: f32 = RegionKind::ALL
        .iter()
        .map(|kind| {
            implausible
                .iter()
                .find(|(k, _)| k == kind)
                .map_or(1.0, |&(_, excess)| 1.0 / (1.0 + excess as f32))
        })
        .sum();
    factor / RegionKind::ALL.len() as f32
}

/// Alignment of lines within multi-line blocks, weighted by line count.
/// Neutral (0.5) when no block has more than one line.
fn text_regularity(blocks: &[TextBlock], page_w: u32) -> f32 {
    let mut weighted = 0.0;
    let mut weight = 0.0;
    for block in blocks.iter().filter(|b| b.lines.len() > 1) {
        let spread = alignment_spreads(&block.lines, page_w);
        let best = spread.left.min(spread.center).min(spread.right);
        let w = (block.lines.len() - 1) as f32;
        weighted += w * (-best / REGULARITY_SCALE).exp();
        weight += w;
    }
    if weight == 0.0 {
        0.5
    } else {
        weighted / weight
    }
}

/// How symmetrically seals and logos sit: centred on the vertical axis or
/// mirrored by another emblem. Neutral (0.5) without emblems.
fn emblem_symmetry(regions: &[Region], page_w: u32, page_h: u32) -> f32 {
    let centers: Vec<(f32, f32)> = regions
        .iter()
        .filter(|r| matches!(r.kind, RegionKind::Seal | RegionKind::Logo))
        .map(|r| r.bbox.normalized(page_w, page_h).center())
        .collect();
    if centers.is_empty() {
        return 0.5;
    }
    let total: f32 = centers
        .iter()
        .enumerate()
        .map(|(i, &(cx, cy))| {
            let off_axis = (cx - 0.5).abs();
            let mirrored = centers
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, &(ox, oy))| ((1.0 - cx - ox).powi(2) + (cy - oy).powi(2)).sqrt())
                .fold(f32::INFINITY, f32::min);
            (-off_axis.min(mirrored) / SYMMETRY_SCALE).exp()
        })
        .sum();
    total / centers.len() as f32
}

struct Spreads {
    left: f32,
    center: f32,
    right: f32,
}

fn alignment_spreads(lines: &[BoundingBox], page_w: u32) -> Spreads {
    let w = page_w.max(1) as f32;
    let std_of = |f: &dyn Fn(&BoundingBox) -> f32| {
        let values: Vec<f32> = lines.iter().map(|b| f(b) / w).collect();
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32).sqrt()
    };
    Spreads {
        left: std_of(&|b| b.x as f32),
        center: std_of(&|b| b.center().0),
        right: std_of(&|b| b.right() as f32),
    }
}

// ═══════════════════════════════════════════════════════════
// Summary
// ═══════════════════════════════════════════════════════════

pub fn summarize(regions: &[Region], blocks: &[TextBlock], page_w: u32, page_h: u32) -> ShapeSummary {
    ShapeSummary {
        seal_position: seal_position(regions, page_w, page_h),
        text_alignment: text_alignment(blocks, page_w),
        logo_integrity: logo_integrity(regions),
    }
}

fn strongest(regions: &[Region], kind: RegionKind) -> Option<&Region> {
    regions
        .iter()
        .filter(|r| r.kind == kind)
        .fold(None, |best: Option<&Region>, r| match best {
            Some(b) if b.confidence >= r.confidence => Some(b),
            _ => Some(r),
        })
}

fn seal_position(regions: &[Region], page_w: u32, page_h: u32) -> SealPosition {
    let Some(seal) = strongest(regions, RegionKind::Seal) else {
        return SealPosition::Absent;
    };
    let (cx, cy) = seal.bbox.normalized(page_w, page_h).center();
    let cell = |v: f32| ((v * 3.0).floor() as i32).clamp(0, 2);
    match (cell(cy), cell(cx)) {
        (0, 0) => SealPosition::TopLeft,
        (0, 1) => SealPosition::TopCenter,
        (0, _) => SealPosition::TopRight,
        (1, 0) => SealPosition::MiddleLeft,
        (1, 1) => SealPosition::Center,
        (1, _) => SealPosition::MiddleRight,
        (_, 0) => SealPosition::BottomLeft,
        (_, 1) => SealPosition::BottomCenter,
        _ => SealPosition::BottomRight,
    }
}

/// Alignment of the block with the most lines.
fn text_alignment(blocks: &[TextBlock], page_w: u32) -> TextAlignment {
    let Some(main) = blocks
        .iter()
        .fold(None, |best: Option<&TextBlock>, b| match best {
            Some(m) if m.lines.len() >= b.lines.len() => Some(m),
            _ => Some(b),
        })
    else {
        return TextAlignment::Absent;
    };

    if main.lines.len() == 1 {
        let cx = main.lines[0].center().0 / page_w.max(1) as f32;
        return if (cx - 0.5).abs() <= SINGLE_LINE_CENTER_TOLERANCE {
            TextAlignment::CenterAligned
        } else {
            TextAlignment::LeftAligned
        };
    }

    let s = alignment_spreads(&main.lines, page_w);
    if s.left <= ALIGN_TOLERANCE && s.right <= ALIGN_TOLERANCE {
        TextAlignment::Justified
    } else if s.center <= ALIGN_TOLERANCE {
        TextAlignment::CenterAligned
    } else if s.left <= ALIGN_TOLERANCE {
        TextAlignment::LeftAligned
    } else {
        TextAlignment::Irregular
    }
}

fn logo_integrity(regions: &[Region]) -> LogoIntegrity {
    match strongest(regions, RegionKind::Logo) {
        None => LogoIntegrity::Absent,
        Some(logo) if logo.confidence >= LOGO_INTACT => LogoIntegrity::Intact,
        Some(logo) if logo.confidence >= LOGO_DAMAGED => LogoIntegrity::PartiallyDamaged,
        Some(_) => LogoIntegrity::Suspicious,
    }
}
