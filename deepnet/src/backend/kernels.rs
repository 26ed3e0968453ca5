//! GPU Compute Kernels (WGSL)
//!
//! The dense kernel computes `activation(A * B + bias)` for padded row-major
//! matrices. Every invocation owns one 8x8 tile of the output.

pub const KERNELS_WGSL: &str = r#"
// ============================================================================
// DEEPNET - DENSE LAYER KERNELS
// ============================================================================
// Buffers are padded so both dimensions are multiples of TILE. Padding cells
// are zero, so the inner loop runs over the padded width without branches.
// ============================================================================

const TILE: u32 = 8u;
const TANH_CLAMP: f32 = 15.0;

const ACT_IDENTITY: u32 = 0u;
const ACT_TANH: u32 = 1u;
const ACT_SIGMOID: u32 = 2u;
const ACT_RELU: u32 = 3u;

// m: batch rows, k: output columns, n: inner dimension (all logical).
// pbytes / qbytes: padded row strides of the input and of weights/output.
struct Dims {
    m: u32,
    k: u32,
    n: u32,
    pbytes: u32,
    qbytes: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
}

@group(0) @binding(0) var<storage, read> dense_in: array<f32>;
@group(0) @binding(1) var<storage, read> dense_weights: array<f32>;
@group(0) @binding(2) var<storage, read> dense_bias: array<f32>;
@group(0) @binding(3) var<storage, read_write> dense_out: array<f32>;
@group(0) @binding(4) var<uniform> dims: Dims;

fn activate(x: f32, act: u32) -> f32 {
    var y = x;
    if (act == ACT_TANH) {
        // Fast-math tanh overflows to NaN for large |x|.
        y = tanh(clamp(x, -TANH_CLAMP, TANH_CLAMP));
    } else if (act == ACT_SIGMOID) {
        y = 1.0 / (1.0 + exp(-x));
    } else if (act == ACT_RELU) {
        y = max(x, 0.0);
    }
    return y;
}

fn dense_tile(gid: vec3<u32>, act: u32, checked: bool) {
    let p = dims.pbytes / 4u;
    let q = dims.qbytes / 4u;
    let col0 = gid.x * TILE;
    let row0 = gid.y * TILE;

    // The last workgroup along x can overhang the padded output width.
    if (col0 >= q) { return; }
    if (checked && (row0 >= dims.m || col0 >= dims.k)) { return; }

    var acc: array<array<f32, 8>, 8>;
    var b: array<f32, 8>;

    for (var i = 0u; i < p; i = i + 1u) {
        let b_base = i * q + col0;
        for (var c = 0u; c < TILE; c = c + 1u) {
            b[c] = dense_weights[b_base + c];
        }
        for (var r = 0u; r < TILE; r = r + 1u) {
            let a = dense_in[(row0 + r) * p + i];
            for (var c = 0u; c < TILE; c = c + 1u) {
                acc[r][c] = acc[r][c] + a * b[c];
            }
        }
    }

    for (var r = 0u; r < TILE; r = r + 1u) {
        let row = row0 + r;
        if (checked && row >= dims.m) { break; }
        for (var c = 0u; c < TILE; c = c + 1u) {
            let col = col0 + c;
            if (checked && col >= dims.k) { break; }
            dense_out[row * q + col] = activate(acc[r][c] + dense_bias[col], act);
        }
    }
}

// --- Bounds-checked variants: never touch the padding ---

@compute @workgroup_size(64, 1, 1)
fn dense_identity(@builtin(global_invocation_id) gid: vec3<u32>) {
    dense_tile(gid, ACT_IDENTITY, true);
}

@compute @workgroup_size(64, 1, 1)
fn dense_tanh(@builtin(global_invocation_id) gid: vec3<u32>) {
    dense_tile(gid, ACT_TANH, true);
}

@compute @workgroup_size(64, 1, 1)
fn dense_sigmoid(@builtin(global_invocation_id) gid: vec3<u32>) {
    dense_tile(gid, ACT_SIGMOID, true);
}

@compute @workgroup_size(64, 1, 1)
fn dense_relu(@builtin(global_invocation_id) gid: vec3<u32>) {
    dense_tile(gid, ACT_RELU, true);
}

// --- Unchecked variants: full tiles, pad cells are overwritten ---

@compute @workgroup_size(64, 1, 1)
fn dense_identity_unchecked(@builtin(global_invocation_id) gid: vec3<u32>) {
    dense_tile(gid, ACT_IDENTITY, false);
}

@compute @workgroup_size(64, 1, 1)
fn dense_tanh_unchecked(@builtin(global_invocation_id) gid: vec3<u32>) {
    dense_tile(gid, ACT_TANH, false);
}

@compute @workgroup_size(64, 1, 1)
fn dense_sigmoid_unchecked(@builtin(global_invocation_id) gid: vec3<u32>) {
    dense_tile(gid, ACT_SIGMOID, false);
}

@compute @workgroup_size(64, 1, 1)
fn dense_relu_unchecked(@builtin(global_invocation_id) gid: vec3<u32>) {
    dense_tile(gid, ACT_RELU, false);
}
"#;
