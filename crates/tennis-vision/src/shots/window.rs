//! Fixed-length pose window assembly for the shot classifier.

use ndarray::Array2;
use tennis_models::{PlayerFrame, PlayerTrack, POSE_KEYPOINTS};

/// Columns per window row: x, y, score for every keypoint.
pub const WINDOW_COLUMNS: usize = POSE_KEYPOINTS * 3;

/// Pose window of `before + 1 + after` rows centred on `contact_frame`.
///
/// Keypoints are normalized to the player box. Frames without a pose (clip
/// boundaries, occlusion) repeat the nearest available row; a track with no
/// pose at all yields zeros. The window always has the full length.
pub fn pose_window(
    track: &PlayerTrack,
    contact_frame: u64,
    before: usize,
    after: usize,
) -> Array2<f32> {
    let len = before + 1 + after;
    let first = contact_frame as i64 - before as i64;

    let mut rows: Vec<Option<Vec<f32>>> = (0..len)
        .map(|i| {
            let frame = first + i as i64;
            if frame < 0 {
                return None;
            }
            find_frame(track, frame as u64).and_then(normalized_row)
        })
        .collect();

    // Edge replication: forward, then backward for a leading run.
    let mut last: Option<Vec<f32>> = None;
    for row in rows.iter_mut() {
        match row {
            Some(r) => last = Some(r.clone()),
            None => *row = last.clone(),
        }
    }
    let mut next: Option<Vec<f32>> = None;
    for row in rows.iter_mut().rev() {
        match row {
            Some(r) => next = Some(r.clone()),
            None => *row = next.clone(),
        }
    }

    let mut window = Array2::<f32>::zeros((len, WINDOW_COLUMNS));
    for (i, row) in rows.iter().enumerate() {
        if let Some(values) = row {
            for (j, v) in values.iter().enumerate() {
                window[[i, j]] = *v;
            }
        }
    }
    window
}

fn find_frame(track: &PlayerTrack, frame_index: u64) -> Option<&PlayerFrame> {
    track
        .frames
        .binary_search_by_key(&frame_index, |f| f.frame_index)
        .ok()
        .map(|i| &track.frames[i])
}

fn normalized_row(frame: &PlayerFrame) -> Option<Vec<f32>> {
    let pose = frame.pose.as_ref()?;
    let (w, h) = (frame.bbox.width.max(1.0), frame.bbox.height.max(1.0));
    let mut row = Vec::with_capacity(WINDOW_COLUMNS);
    for k in &pose.keypoints {
        row.push(((k.x - frame.bbox.x) / w) as f32);
        row.push(((k.y - frame.bbox.y) / h) as f32);
        row.push(k.score as f32);
    }
    Some(row)
}
