//! Two-layer LSTM regressor trained with backpropagation through time.
//!
//! LSTM(h1, full sequence) → LSTM(h2, last state) → Dense(d, linear) →
//! Dense(1, linear), minimizing mean squared error with Adam.
//!
//! Weights are stored gate-concatenated in `i, f, g, o` order:
//! `w: (input, 4h)`, `u: (h, 4h)`, `b: (1, 4h)`. Every time step is a pair
//! of batch matmuls.

use super::{ForecastConfig, SequenceRegressor};
use ndarray::{s, Array1, Array2, Array3, Axis, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-7;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn glorot_uniform(rng: &mut StdRng, rows: usize, cols: usize) -> Array2<f64> {
    let limit = (6.0 / (rows + cols) as f64).sqrt();
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-limit..limit))
}

/// A trainable tensor with its gradient and Adam moments.
#[derive(Debug, Clone)]
struct Param {
    value: Array2<f64>,
    grad: Array2<f64>,
    m: Array2<f64>,
    v: Array2<f64>,
}

impl Param {
    fn new(value: Array2<f64>) -> Self {
        let dim = value.raw_dim();
        Self {
            grad: Array2::zeros(dim.clone()),
            m: Array2::zeros(dim.clone()),
            v: Array2::zeros(dim),
            value,
        }
    }
}

#[derive(Debug, Clone)]
struct Adam {
    learning_rate: f64,
    t: i32,
}

impl Adam {
    fn step(&mut self, params: Vec<&mut Param>) {
        self.t += 1;
        let bc1 = 1.0 - ADAM_BETA1.powi(self.t);
        let bc2 = 1.0 - ADAM_BETA2.powi(self.t);
        let lr = self.learning_rate;
        for p in params {
            Zip::from(&mut p.value)
                .and(&mut p.m)
                .and(&mut p.v)
                .and(&p.grad)
                .for_each(|w, m, v, &g| {
                    *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
                    *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
                    let m_hat = *m / bc1;
                    let v_hat = *v / bc2;
                    *w -= lr * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
                });
        }
    }
}

// ── Layers ───────────────────────────────────────────────────────────

/// Activations kept from one forward step for the backward pass.
#[derive(Debug)]
struct StepCache {
    x: Array2<f64>,
    h_prev: Array2<f64>,
    c_prev: Array2<f64>,
    i: Array2<f64>,
    f: Array2<f64>,
    g: Array2<f64>,
    o: Array2<f64>,
    tanh_c: Array2<f64>,
}

#[derive(Debug, Clone)]
struct LstmLayer {
    hidden: usize,
    w: Param,
    u: Param,
    b: Param,
}

impl LstmLayer {
    fn new(rng: &mut StdRng, input: usize, hidden: usize) -> Self {
        let mut b = Array2::zeros((1, 4 * hidden));
        b.slice_mut(s![.., hidden..2 * hidden]).fill(1.0);
        Self {
            hidden,
            w: Param::new(glorot_uniform(rng, input, 4 * hidden)),
            u: Param::new(glorot_uniform(rng, hidden, 4 * hidden)),
            b: Param::new(b),
        }
    }

    /// Hidden state after every step, plus caches for backward.
    fn forward(&self, xs: &[Array2<f64>]) -> (Vec<Array2<f64>>, Vec<StepCache>) {
        let h = self.hidden;
        let batch = xs.first().map_or(0, |x| x.nrows());
        let mut h_t = Array2::zeros((batch, h));
        let mut c_t = Array2::zeros((batch, h));
        let mut outputs = Vec::with_capacity(xs.len());
        let mut caches = Vec::with_capacity(xs.len());

        for x in xs {
            let z = x.dot(&self.w.value) + h_t.dot(&self.u.value) + &self.b.value;
            let i = z.slice(s![.., 0..h]).mapv(sigmoid);
            let f = z.slice(s![.., h..2 * h]).mapv(sigmoid);
            let g = z.slice(s![.., 2 * h..3 * h]).mapv(f64::tanh);
            let o = z.slice(s![.., 3 * h..]).mapv(sigmoid);
            let c = &f * &c_t + &i * &g;
            let tanh_c = c.mapv(f64::tanh);
            let h_next = &o * &tanh_c;

            outputs.push(h_next.clone());
            caches.push(StepCache {
                x: x.clone(),
                h_prev: h_t,
                c_prev: c_t,
                i,
                f,
                g,
                o,
                tanh_c,
            });
            h_t = h_next;
            c_t = c;
        }
        (outputs, caches)
    }

    /// Accumulate gradients given dL/dh for every step; returns dL/dx per step.
    fn backward(&mut self, caches: &[StepCache], d_out: &[Array2<f64>]) -> Vec<Array2<f64>> {
        let h = self.hidden;
        let batch = caches.first().map_or(0, |c| c.x.nrows());
        let mut dh_next = Array2::<f64>::zeros((batch, h));
        let mut dc_next = Array2::<f64>::zeros((batch, h));
        let mut dxs = vec![Array2::zeros((0, 0)); caches.len()];

        for t in (0..caches.len()).rev() {
            let cache = &caches[t];
            let dh = &d_out[t] + &dh_next;
            let d_o = &dh * &cache.tanh_c;
            let dc = &dh * &cache.o * &cache.tanh_c.mapv(|v| 1.0 - v * v) + &dc_next;
            let d_i = &dc * &cache.g;
            let d_g = &dc * &cache.i;
            let d_f = &dc * &cache.c_prev;
            dc_next = &dc * &cache.f;

            let mut dz = Array2::<f64>::zeros((batch, 4 * h));
            dz.slice_mut(s![.., 0..h])
                .assign(&(d_i * &cache.i.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., h..2 * h])
                .assign(&(d_f * &cache.f.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., 2 * h..3 * h])
                .assign(&(d_g * &cache.g.mapv(|v| 1.0 - v * v)));
            dz.slice_mut(s![.., 3 * h..])
                .assign(&(d_o * &cache.o.mapv(|v| v * (1.0 - v))));

            self.w.grad += &cache.x.t().dot(&dz);
            self.u.grad += &cache.h_prev.t().dot(&dz);
            self.b.grad += &dz.sum_axis(Axis(0)).insert_axis(Axis(0));
            dxs[t] = dz.dot(&self.w.value.t());
            dh_next = dz.dot(&self.u.value.t());
        }
        dxs
    }

    fn params_mut(&mut self) -> [&mut Param; 3] {
        [&mut self.w, &mut self.u, &mut self.b]
    }
}

#[derive(Debug, Clone)]
struct DenseLayer {
    w: Param,
    b: Param,
}

impl DenseLayer {
    fn new(rng: &mut StdRng, input: usize, output: usize) -> Self {
        Self {
            w: Param::new(glorot_uniform(rng, input, output)),
            b: Param::new(Array2::zeros((1, output))),
        }
    }

    fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        x.dot(&self.w.value) + &self.b.value
    }

    fn backward(&mut self, x: &Array2<f64>, dy: &Array2<f64>) -> Array2<f64> {
        self.w.grad += &x.t().dot(dy);
        self.b.grad += &dy.sum_axis(Axis(0)).insert_axis(Axis(0));
        dy.dot(&self.w.value.t())
    }

    fn params_mut(&mut self) -> [&mut Param; 2] {
        [&mut self.w, &mut self.b]
    }
}

// ── Network ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Network {
    lstm1: LstmLayer,
    lstm2: LstmLayer,
    dense1: DenseLayer,
    dense2: DenseLayer,
}

/// Split `(batch, steps, features)` into one `(batch, features)` matrix per step.
fn time_steps(x: &Array3<f64>) -> Vec<Array2<f64>> {
    x.axis_iter(Axis(1)).map(|step| step.to_owned()).collect()
}

impl Network {
    fn new(rng: &mut StdRng, input: usize, config: &ForecastConfig) -> Self {
        Self {
            lstm1: LstmLayer::new(rng, input, config.hidden_units.0),
            lstm2: LstmLayer::new(rng, config.hidden_units.0, config.hidden_units.1),
            dense1: DenseLayer::new(rng, config.hidden_units.1, config.dense_units),
            dense2: DenseLayer::new(rng, config.dense_units, 1),
        }
    }

    fn predict(&self, x: &Array3<f64>) -> Array1<f64> {
        let (seq1, _) = self.lstm1.forward(&time_steps(x));
        let (seq2, _) = self.lstm2.forward(&seq1);
        let Some(last) = seq2.last() else {
            return Array1::zeros(x.len_of(Axis(0)));
        };
        self.dense2
            .forward(&self.dense1.forward(last))
            .column(0)
            .to_owned()
    }

    fn loss(&self, x: &Array3<f64>, y: &Array1<f64>) -> f64 {
        (&self.predict(x) - y).mapv(|d| d * d).mean().unwrap_or(0.0)
    }

    fn zero_grad(&mut self) {
        for p in self.params_mut() {
            p.grad.fill(0.0);
        }
    }

    /// Forward + backward on one batch. Gradients accumulate into the
    /// params; returns the batch MSE.
    fn accumulate_gradients(&mut self, x: &Array3<f64>, y: &Array1<f64>) -> f64 {
        let steps = time_steps(x);
        if steps.is_empty() || y.is_empty() {
            return 0.0;
        }
        let batch = y.len() as f64;

        let (seq1, cache1) = self.lstm1.forward(&steps);
        let (seq2, cache2) = self.lstm2.forward(&seq1);
        let last = &seq2[seq2.len() - 1];
        let hidden = self.dense1.forward(last);
        let out = self.dense2.forward(&hidden);

        let diff = &out.column(0) - y;
        let loss = diff.mapv(|d| d * d).mean().unwrap_or(0.0);

        let d_out = (diff * (2.0 / batch)).insert_axis(Axis(1));
        let d_hidden = self.dense2.backward(&hidden, &d_out);
        let d_last = self.dense1.backward(last, &d_hidden);

        let mut d_seq2 = vec![Array2::zeros(last.raw_dim()); seq2.len()];
        d_seq2[seq2.len() - 1] = d_last;
        let d_seq1 = self.lstm2.backward(&cache2, &d_seq2);
        self.lstm1.backward(&cache1, &d_seq1);
        loss
    }

    fn params_mut(&mut self) -> Vec<&mut Param> {
        let mut params = Vec::with_capacity(10);
        params.extend(self.lstm1.params_mut());
        params.extend(self.lstm2.params_mut());
        params.extend(self.dense1.params_mut());
        params.extend(self.dense2.params_mut());
        params
    }
}

/// The default forecasting model.
#[derive(Debug, Clone)]
pub struct LstmRegressor {
    net: Network,
    adam: Adam,
    rng: StdRng,
    epochs: usize,
    batch_size: usize,
}

impl LstmRegressor {
    pub fn new(input_features: usize, config: &ForecastConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let net = Network::new(&mut rng, input_features, config);
        Self {
            net,
            adam: Adam {
                learning_rate: config.learning_rate,
                t: 0,
            },
            rng,
            epochs: config.epochs,
            batch_size: config.batch_size.max(1),
        }
    }

    /// Mean squared error of the current weights on `(x, y)`.
    pub fn loss(&self, x: &Array3<f64>, y: &Array1<f64>) -> f64 {
        self.net.loss(x, y)
    }
}

impl SequenceRegressor for LstmRegressor {
    fn fit(&mut self, x: &Array3<f64>, y: &Array1<f64>) -> Vec<f64> {
        let n = y.len();
        let mut order: Vec<usize> = (0..n).collect();
        let mut history = Vec::with_capacity(self.epochs);

        for _ in 0..self.epochs {
            order.shuffle(&mut self.rng);
            let mut weighted = 0.0;
            for chunk in order.chunks(self.batch_size) {
                let xb = x.select(Axis(0), chunk);
                let yb = y.select(Axis(0), chunk);
                self.net.zero_grad();
                weighted += self.net.accumulate_gradients(&xb, &yb) * chunk.len() as f64;
                self.adam.step(self.net.params_mut());
            }
            history.push(if n > 0 { weighted / n as f64 } else { 0.0 });
        }
        history
    }

    fn predict(&self, x: &Array3<f64>) -> Array1<f64> {
        self.net.predict(x)
    }
}
