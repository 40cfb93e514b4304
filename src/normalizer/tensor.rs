/// Model input in `[1, side, side, 3]` row-major layout, channels R,G,B,
/// every element in `[0, 1]`.
///
/// Deliberately not `Clone`: a tensor is produced once and moved into a
/// single classification.
#[derive(Debug, PartialEq)]
pub struct InputTensor {
    side: u32,
    data: Vec<f32>,
}

impl InputTensor {
    pub(crate) fn new(side: u32, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), side as usize * side as usize * 3);
        Self { side, data }
    }

    pub fn side(&self) -> u32 {
        self.side
    }

    pub fn shape(&self) -> [usize; 4] {
        [1, self.side as usize, self.side as usize, 3]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// RGB triple at destination pixel `(x, y)`.
    pub fn rgb_at(&self, x: u32, y: u32) -> [f32; 3] {
        let index = (y as usize * self.side as usize + x as usize) * 3;
        [self.data[index], self.data[index + 1], self.data[index + 2]]
    }
}
