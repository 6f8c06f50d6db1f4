//! Store batching limits.

/// Byte budget of one store request's images.
pub const MESSAGE_SPLIT_BYTES: usize = 1024 * 1024;

/// Node-count budget of one store request.
pub const MAX_BATCH_SIZE: usize = 100;

/// Split images into store batches under both budgets.
///
/// An oversized single image still ships, alone in its batch; the split
/// never drops data.
#[must_use]
pub fn batch_images(images: Vec<Vec<u8>>) -> Vec<Vec<Vec<u8>>> {
    let mut batches = Vec::new();
    let mut current: Vec<Vec<u8>> = Vec::new();
    let mut current_bytes = 0usize;

    for image in images {
        let image_len = image.len();
        let over_bytes = current_bytes + image_len > MESSAGE_SPLIT_BYTES;
        let over_count = current.len() + 1 > MAX_BATCH_SIZE;
        if !current.is_empty() && (over_bytes || over_count) {
            batches.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current_bytes += image_len;
        current.push(image);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_batches() {
        assert!(batch_images(Vec::new()).is_empty());
    }

    #[test]
    fn splits_on_count() {
        let images = vec![vec![0u8; 4]; MAX_BATCH_SIZE + 1];
        let batches = batch_images(images);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), MAX_BATCH_SIZE);
        assert_eq!(batches[1].len(), 1);
    }

    #[test]
    fn splits_on_bytes() {
        let images = vec![vec![0u8; MESSAGE_SPLIT_BYTES / 2 + 1]; 3];
        let batches = batch_images(images);
        assert_eq!(batches.len(), 3);
    }

    #[test]
    fn oversized_image_ships_alone() {
        let images = vec![vec![0u8; MESSAGE_SPLIT_BYTES + 10], vec![0u8; 4]];
        let batches = batch_images(images);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 1);
    }
}
