//! Kernel table indexing and WGSL generation.
//!
//! The compute program holds one entry point per ordered `(from, to)` pair of
//! catalog positions. Entry points are emitted in kernel-index order, so the
//! pipeline vector built from them can be indexed directly with
//! [`kernel_index`].

use std::fmt::Write as _;

use catalog::{FunctionCatalog, FunctionName};

use crate::frame::{FrameSample, PipelineError};

/// Threads per workgroup along each grid axis.
pub const WORKGROUP_SIZE: u32 = 8;

/// Flat index of the kernel morphing catalog position `from` into `to`.
///
/// A steady frame uses `(to, to)`.
pub fn kernel_index(from: usize, to: usize, catalog_len: usize) -> usize {
    debug_assert!(from < catalog_len && to < catalog_len);
    to + from * catalog_len
}

/// Catalog positions recovered from a kernel index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelPair {
    pub from: usize,
    pub to: usize,
}

impl KernelPair {
    pub fn from_index(index: usize, catalog_len: usize) -> Self {
        Self {
            from: index / catalog_len,
            to: index % catalog_len,
        }
    }

    pub fn index(&self, catalog_len: usize) -> usize {
        kernel_index(self.from, self.to, catalog_len)
    }
}

/// Kernel for `sample` in a table built from `catalog`.
///
/// Indices use catalog positions, so a configured subset gets a dense table.
/// A steady sample selects the diagonal entry `(to, to)`.
pub fn kernel_for_sample(
    catalog: &FunctionCatalog,
    sample: &FrameSample,
) -> Result<usize, PipelineError> {
    let position = |name| {
        catalog
            .index_of(name)
            .ok_or(PipelineError::UnknownFunction(name))
    };
    let to = position(sample.to)?;
    let from = if sample.is_transitioning() {
        position(sample.from)?
    } else {
        to
    };
    Ok(kernel_index(from, to, catalog.len()))
}

/// Workgroups per axis needed to cover `resolution` cells.
pub fn dispatch_groups(resolution: u32) -> u32 {
    resolution.div_ceil(WORKGROUP_SIZE)
}

pub fn entry_point_name(from: FunctionName, to: FunctionName) -> String {
    format!("kernel_{from}_to_{to}")
}

/// Entry point names in kernel-index order.
pub fn entry_points(catalog: &FunctionCatalog) -> Vec<String> {
    let names: Vec<FunctionName> = catalog.names().collect();
    names
        .iter()
        .flat_map(|&from| names.iter().map(move |&to| entry_point_name(from, to)))
        .collect()
}

const PRELUDE: &str = r"const PI: f32 = 3.14159265358979;

struct GraphUniforms {
    resolution: u32,
    step: f32,
    time: f32,
    transition_progress: f32,
}

@group(0) @binding(0) var<uniform> graph: GraphUniforms;
@group(0) @binding(1) var<storage, read_write> positions: array<f32>;

fn grid_uv(id: vec3<u32>) -> vec2<f32> {
    return (vec2<f32>(id.xy) + 0.5) * graph.step - 1.0;
}

fn store_position(id: vec3<u32>, position: vec3<f32>) {
    if (id.x < graph.resolution && id.y < graph.resolution) {
        let base = (id.x + id.y * graph.resolution) * 3u;
        positions[base] = position.x;
        positions[base + 1u] = position.y;
        positions[base + 2u] = position.z;
    }
}
";

/// Builds the WGSL compute program covering every ordered pair in `catalog`.
pub fn generate_kernel_table(catalog: &FunctionCatalog) -> String {
    let mut source = String::from(PRELUDE);
    for name in catalog.names() {
        source.push('\n');
        source.push_str(name.wgsl());
    }

    for from in catalog.names() {
        for to in catalog.names() {
            let body = if from == to {
                format!("{to}(uv.x, uv.y, graph.time)")
            } else {
                format!(
                    "mix({from}(uv.x, uv.y, graph.time), {to}(uv.x, uv.y, graph.time), vec3<f32>(graph.transition_progress))"
                )
            };
            // Writing into a String cannot fail.
            let _ = write!(
                source,
                "
@compute @workgroup_size({WORKGROUP_SIZE}, {WORKGROUP_SIZE}, 1)
fn {entry}(@builtin(global_invocation_id) id: vec3<u32>) {{
    let uv = grid_uv(id);
    store_position(id, {body});
}}
",
                entry = entry_point_name(from, to),
            );
        }
    }
    source
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use wgpu::naga;

    #[test]
    fn kernel_index_is_injective_and_invertible() {
        for n in 1..=FunctionName::COUNT {
            let mut seen = HashSet::new();
            for from in 0..n {
                for to in 0..n {
                    let index = kernel_index(from, to, n);
                    assert!(index < n * n);
                    assert!(seen.insert(index), "duplicate index {index}");
                    assert_eq!(KernelPair::from_index(index, n), KernelPair { from, to });
                    assert_eq!(index % n, to);
                    assert_eq!(index / n, from);
                }
            }
            assert_eq!(seen.len(), n * n);
        }
    }

    #[test]
    fn steady_kernels_sit_on_the_diagonal() {
        let n = FunctionName::COUNT;
        for position in 0..n {
            assert_eq!(kernel_index(position, position, n), position * (n + 1));
        }
    }

    #[test]
    fn sample_selects_kernel_by_catalog_position() {
        let catalog =
            FunctionCatalog::with_functions(&[FunctionName::Torus, FunctionName::Wave]).unwrap();

        let steady = FrameSample::steady(FunctionName::Wave, 0.0);
        assert_eq!(kernel_for_sample(&catalog, &steady).unwrap(), 3);

        let morph = FrameSample {
            time: 0.0,
            from: FunctionName::Wave,
            to: FunctionName::Torus,
            progress: Some(0.4),
        };
        assert_eq!(kernel_for_sample(&catalog, &morph).unwrap(), 2);

        // `from` is ignored while steady.
        let stale = FrameSample {
            from: FunctionName::Ripple,
            ..FrameSample::steady(FunctionName::Torus, 1.0)
        };
        assert_eq!(kernel_for_sample(&catalog, &stale).unwrap(), 0);

        let missing = FrameSample::steady(FunctionName::Ripple, 0.0);
        assert_eq!(
            kernel_for_sample(&catalog, &missing).unwrap_err(),
            PipelineError::UnknownFunction(FunctionName::Ripple)
        );
    }

    #[test]
    fn full_catalog_selection_matches_entry_order() {
        let catalog = FunctionCatalog::new();
        let entries = entry_points(&catalog);
        let morph = FrameSample {
            time: 0.0,
            from: FunctionName::Sphere,
            to: FunctionName::Ripple,
            progress: Some(0.5),
        };
        let index = kernel_for_sample(&catalog, &morph).unwrap();
        assert_eq!(entries[index], "kernel_sphere_to_ripple");
    }

    #[test]
    fn dispatch_covers_every_cell() {
        assert_eq!(dispatch_groups(10), 2);
        assert_eq!(dispatch_groups(16), 2);
        assert_eq!(dispatch_groups(17), 3);
        assert_eq!(dispatch_groups(2000), 250);
        for resolution in 10..=200 {
            let groups = dispatch_groups(resolution);
            assert!(groups * WORKGROUP_SIZE >= resolution);
            assert!((groups - 1) * WORKGROUP_SIZE < resolution);
        }
    }

    #[test]
    fn entry_points_follow_kernel_index_order() {
        let catalog = FunctionCatalog::new();
        let entries = entry_points(&catalog);
        assert_eq!(entries.len(), 25);
        assert_eq!(entries[0], "kernel_wave_to_wave");
        assert_eq!(entries[1], "kernel_wave_to_multi_wave");
        assert_eq!(entries[5], "kernel_multi_wave_to_wave");
        let index = kernel_index(3, 4, catalog.len());
        assert_eq!(entries[index], "kernel_sphere_to_torus");
    }

    #[test]
    fn generated_table_validates() {
        for catalog in [
            FunctionCatalog::new(),
            FunctionCatalog::with_functions(&[FunctionName::Torus, FunctionName::Wave]).unwrap(),
        ] {
            let source = generate_kernel_table(&catalog);
            let module = naga::front::wgsl::parse_str(&source).expect("kernel table parses");
            naga::valid::Validator::new(
                naga::valid::ValidationFlags::all(),
                naga::valid::Capabilities::all(),
            )
            .validate(&module)
            .expect("kernel table validates");

            let declared: Vec<&str> = module
                .entry_points
                .iter()
                .map(|entry| entry.name.as_str())
                .collect();
            let expected = entry_points(&catalog);
            assert_eq!(declared, expected);
            for entry in &module.entry_points {
                assert_eq!(entry.workgroup_size, [WORKGROUP_SIZE, WORKGROUP_SIZE, 1]);
            }
        }
    }
}
