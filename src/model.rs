use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, Relu,
    },
    prelude::*,
    tensor::activation::softmax,
};

use crate::IMAGE_SIZE;

#[derive(Config, Debug)]
pub struct ModelConfig {
    #[config(default = 32)]
    pub conv1_channels: usize,
    #[config(default = 64)]
    pub conv2_channels: usize,
    #[config(default = 3)]
    pub kernel_size: usize,
    #[config(default = 128)]
    pub hidden_size: usize,
    #[config(default = 0.5)]
    pub dropout: f64,
    #[config(default = 10)]
    pub num_classes: usize,
}

/// Two convolution + max pooling stages followed by a dense classifier head.
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    pool: MaxPool2d,
    hidden: Linear<B>,
    dropout: Dropout,
    output: Linear<B>,
    activation: Relu,
}

impl ModelConfig {
    /// Side of the feature maps entering the dense head.
    ///
    /// Each stage is a valid convolution followed by a 2x2 pool with stride 2:
    /// 28 -> 26 -> 13 -> 11 -> 5 for the default kernel.
    pub fn feature_side(&self) -> usize {
        let stage = |side: usize| (side - (self.kernel_size - 1)) / 2;
        stage(stage(IMAGE_SIZE))
    }

    pub fn flattened_size(&self) -> usize {
        let side = self.feature_side();
        self.conv2_channels * side * side
    }

    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Model<B> {
        let kernel = [self.kernel_size, self.kernel_size];

        Model {
            conv1: Conv2dConfig::new([1, self.conv1_channels], kernel).init(device),
            conv2: Conv2dConfig::new([self.conv1_channels, self.conv2_channels], kernel)
                .init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            hidden: LinearConfig::new(self.flattened_size(), self.hidden_size).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            output: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> Model<B> {
    /// # Shapes
    ///   - Images [batch_size, height, width, channels]
    ///   - Output [batch_size, num_classes]
    ///
    /// Returns raw logits; see [`Model::probabilities`] for the softmax output.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        // Channels last at the boundary, channels first for the convolutions.
        let x = images.permute([0, 3, 1, 2]);

        let x = self.conv1.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool.forward(x);

        let x = self.conv2.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool.forward(x);

        let [batch_size, channels, height, width] = x.dims();
        let x = x.reshape([batch_size, channels * height * width]);

        let x = self.hidden.forward(x);
        let x = self.activation.forward(x);
        let x = self.dropout.forward(x);

        self.output.forward(x)
    }

    /// Class probabilities, one row per image, each row summing to one.
    pub fn probabilities(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(images), 1)
    }
}
