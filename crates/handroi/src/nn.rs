//! Neural Network inference.

use std::{
    ops::{Index, RangeInclusive},
    path::Path,
    sync::Arc,
};

use anyhow::Context;
use ndarray::{Array4, ArrayD, IxDyn};
use tract_onnx::prelude::{
    tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TypedFact, TypedOp,
};

use crate::image::{Color, Image, Resolution};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A model that maps an NCHW `f32` image tensor to a list of output tensors.
///
/// [`Cnn`] implements this for ONNX models. Tests and alternative runtimes can provide their own
/// implementations.
pub trait Network {
    /// Returns the resolution of the image the network expects as input.
    fn input_resolution(&self) -> Resolution;

    /// Runs a forward pass on a tensor of shape `[1, 3, height, width]`.
    fn forward(&self, input: &Array4<f32>) -> anyhow::Result<Outputs>;

    /// Converts `image` to an input tensor and runs a forward pass.
    ///
    /// The image is stretched to the network's input resolution if it does not already match.
    fn estimate(&self, image: &Image, mapper: &ColorMapper) -> anyhow::Result<Outputs> {
        let res = self.input_resolution();
        let tensor = if image.resolution() == res {
            image_to_nchw(image, mapper)
        } else {
            image_to_nchw(&image.resize_exact(res), mapper)
        };
        self.forward(&tensor)
    }
}

impl<N: Network + ?Sized> Network for Box<N> {
    fn input_resolution(&self) -> Resolution {
        (**self).input_resolution()
    }

    fn forward(&self, input: &Array4<f32>) -> anyhow::Result<Outputs> {
        (**self).forward(input)
    }
}

/// Converts an image to a `[1, 3, height, width]` tensor, mapping colors with `mapper`.
pub fn image_to_nchw(image: &Image, mapper: &ColorMapper) -> Array4<f32> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| {
        mapper.map(image.get(x as u32, y as u32))[c]
    })
}

/// Maps 8-bit sRGB colors to the value range a network expects.
#[derive(Debug, Clone)]
pub struct ColorMapper {
    target_range: RangeInclusive<f32>,
}

impl ColorMapper {
    /// Creates a simple color mapper that uniformly maps sRGB values to `target_range`.
    ///
    /// Note that this operates on *non-linear* sRGB colors, but maps them linearly to the target
    /// range.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        assert!(target_range.end() > target_range.start());
        Self { target_range }
    }

    pub fn map(&self, color: Color) -> [f32; 3] {
        let start = *self.target_range.start();
        let end = *self.target_range.end();

        let rgb = [color.r(), color.g(), color.b()];
        rgb.map(|col| col as f32 / 255.0 * (end - start) + start)
    }
}

/// A convolutional neural network (CNN) that operates on square NCHW image data.
///
/// Like the underlying [`NeuralNetwork`], this is a cheaply [`Clone`]able handle.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    input_res: Resolution,
}

impl Cnn {
    /// Creates a CNN wrapper from a [`NeuralNetwork`].
    ///
    /// The network must have exactly one input of shape `[1, 3, H, W]`.
    pub fn new(nn: NeuralNetwork) -> anyhow::Result<Self> {
        let input_res = Self::get_input_res(&nn)?;
        Ok(Self { nn, input_res })
    }

    /// Loads an ONNX model from `path` and wraps it.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let nn = NeuralNetwork::from_path(path)
            .with_context(|| format!("failed to load network from '{}'", path.display()))?;
        Self::new(nn)
    }

    fn get_input_res(nn: &NeuralNetwork) -> anyhow::Result<Resolution> {
        let shapes = nn.input_shapes()?;
        let shape = match &*shapes {
            [shape] => shape,
            _ => anyhow::bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                shapes.len(),
            ),
        };

        let (w, h) = match &**shape {
            [1, 3, h, w] => (*w, *h),
            _ => anyhow::bail!("invalid model input shape for NCHW CNN: {:?}", shape),
        };

        let (w, h): (u32, u32) = (w.try_into()?, h.try_into()?);
        Ok(Resolution::new(w, h))
    }
}

impl Network for Cnn {
    #[inline]
    fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    fn forward(&self, input: &Array4<f32>) -> anyhow::Result<Outputs> {
        self.nn.estimate(input)
    }
}

/// A neural network that can be used for inference.
///
/// This is a cheaply [`Clone`]able handle to the underlying network structures.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Model>);

impl NeuralNetwork {
    /// Loads and optimizes a pre-trained model from an ONNX file path.
    ///
    /// The path must have a `.onnx` extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::from_path_impl(path.as_ref())
    }

    fn from_path_impl(path: &Path) -> anyhow::Result<Self> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => anyhow::bail!("neural network file must have `.onnx` extension"),
        }

        let model_data = std::fs::read(path)?;
        Self::from_onnx(&model_data)
    }

    /// Loads and optimizes a pre-trained model from an in-memory ONNX file.
    ///
    /// Returns an error if the network data is malformed, if the network data is incomplete, or if
    /// the network uses unimplemented operations.
    pub fn from_onnx(raw: &[u8]) -> anyhow::Result<Self> {
        let graph = tract_onnx::onnx()
            .model_for_read(&mut &*raw)?
            .into_optimized()?;
        let outputs = graph.output_outlets()?.to_vec();
        let model = SimplePlan::new_for_outputs(graph, &outputs)?;
        Ok(Self(Arc::new(model)))
    }

    /// Returns the number of input nodes of the network.
    pub fn num_inputs(&self) -> usize {
        self.0.model().inputs.len()
    }

    /// Returns the concrete shapes of all network inputs.
    pub fn input_shapes(&self) -> anyhow::Result<Vec<Vec<usize>>> {
        let model = self.0.model();
        (0..self.num_inputs())
            .map(|id| -> anyhow::Result<Vec<usize>> {
                let fact = model.input_fact(id)?;
                let shape = fact
                    .shape
                    .as_concrete()
                    .with_context(|| format!("network input {} has a symbolic shape", id))?;
                Ok(shape.to_vec())
            })
            .collect()
    }

    /// Runs the network on a single NCHW input tensor, returning the estimated [`Outputs`].
    #[doc(alias = "infer")]
    pub fn estimate(&self, input: &Array4<f32>) -> anyhow::Result<Outputs> {
        let data = input.iter().copied().collect::<Vec<_>>();
        let tensor = tract_onnx::prelude::Tensor::from_shape(input.shape(), &data)?;
        let outputs = self.0.run(tvec![TValue::from_const(Arc::new(tensor))])?;

        let outputs = outputs
            .iter()
            .map(|t| -> anyhow::Result<ArrayD<f32>> {
                let data = t.as_slice::<f32>()?.to_vec();
                Ok(ArrayD::from_shape_vec(IxDyn(t.shape()), data)?)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Outputs::from(outputs))
    }
}

/// The result of a neural network inference pass.
///
/// This is a list of tensors corresponding to the network's output nodes.
#[derive(Debug, Clone)]
pub struct Outputs {
    inner: Vec<ArrayD<f32>>,
}

impl Outputs {
    /// Returns the number of tensors in this inference output.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ArrayD<f32>> {
        self.inner.get(index)
    }

    /// Returns the output tensor at `index` flattened in row-major order.
    pub fn flat(&self, index: usize) -> anyhow::Result<Vec<f32>> {
        let tensor = self.get(index).with_context(|| {
            format!(
                "network produced {} outputs, expected at least {}",
                self.len(),
                index + 1
            )
        })?;
        Ok(tensor.iter().copied().collect())
    }

    /// Returns an iterator over the output tensors.
    pub fn iter(&self) -> impl Iterator<Item = &ArrayD<f32>> {
        self.inner.iter()
    }
}

impl From<Vec<ArrayD<f32>>> for Outputs {
    fn from(inner: Vec<ArrayD<f32>>) -> Self {
        Self { inner }
    }
}

impl Index<usize> for Outputs {
    type Output = ArrayD<f32>;

    fn index(&self, index: usize) -> &ArrayD<f32> {
        &self.inner[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mapper() {
        let mapper = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [-1.0, -1.0, -1.0]);
        assert_eq!(mapper.map(Color::WHITE), [1.0, 1.0, 1.0]);

        let mapper = ColorMapper::linear(0.0..=1.0);
        assert_eq!(mapper.map(Color::RED), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn nchw_layout() {
        let mut image = Image::new(2, 1);
        image.set(0, 0, Color::RED);
        image.set(1, 0, Color::BLUE);
        let tensor = image_to_nchw(&image, &ColorMapper::linear(0.0..=1.0));
        assert_eq!(tensor.shape(), &[1, 3, 1, 2]);
        assert_eq!(tensor[[0, 0, 0, 0]], 1.0);
        assert_eq!(tensor[[0, 0, 0, 1]], 0.0);
        assert_eq!(tensor[[0, 2, 0, 1]], 1.0);
    }

    struct Echo(Resolution);

    impl Network for Echo {
        fn input_resolution(&self) -> Resolution {
            self.0
        }

        fn forward(&self, input: &Array4<f32>) -> anyhow::Result<Outputs> {
            Ok(Outputs::from(vec![input.clone().into_dyn()]))
        }
    }

    #[test]
    fn estimate_resizes_input() {
        let net = Echo(Resolution::new(4, 4));
        let image = Image::filled(Resolution::new(10, 7), Color::WHITE);
        let outputs = net.estimate(&image, &ColorMapper::linear(0.0..=1.0)).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].shape(), &[1, 3, 4, 4]);
        assert!(outputs.flat(0).unwrap().iter().all(|&v| v == 1.0));
        assert!(outputs.flat(1).is_err());
    }

    #[test]
    fn rejects_non_onnx_paths() {
        assert!(NeuralNetwork::from_path("model.tflite").is_err());
        assert!(Cnn::load("does/not/exist.onnx").is_err());
    }
}
