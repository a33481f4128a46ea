//! Named buffer and kernel behaviour of `ComputePipeline`, on a small
//! program. Skips when no adapter is available.

use buddhascope_gpu::{
    ArgSlot, ComputePipeline, GpuAvailability, GpuContext, GpuError, KernelArg, KernelSpec,
    WorkSize,
};

const PROGRAM: &str = r#"
@group(0) @binding(0) var<storage, read_write> add_data: array<u32>;
@group(0) @binding(1) var<uniform> add_amount: u32;

@compute @workgroup_size(64)
fn add_value(@builtin(global_invocation_id) id: vec3<u32>) {
    if id.x >= arrayLength(&add_data) {
        return;
    }
    add_data[id.x] += add_amount;
}

@group(0) @binding(0) var<storage, read_write> copy_src: array<u32>;
@group(0) @binding(1) var<storage, read_write> copy_dst: array<u32>;

@compute @workgroup_size(64)
fn copy_values(@builtin(global_invocation_id) id: vec3<u32>) {
    if id.x >= arrayLength(&copy_dst) {
        return;
    }
    copy_dst[id.x] = copy_src[id.x];
}
"#;

const LEN: u32 = 100;

async fn pipeline() -> Option<ComputePipeline> {
    let GpuAvailability::Available(ctx) = GpuContext::try_init().await else {
        println!("Skipping test: no GPU available");
        return None;
    };
    let mut pipeline = ComputePipeline::new(ctx, "test_program", PROGRAM).await.unwrap();
    for name in ["a", "b", "c"] {
        pipeline.declare_buffer(name, LEN as u64 * 4).await.unwrap();
    }
    pipeline
        .declare_kernel(&KernelSpec::new(
            "add",
            "add_value",
            WorkSize::one_d(LEN),
            vec![ArgSlot::Buffer, ArgSlot::value_of::<u32>()],
        ))
        .await
        .unwrap();
    pipeline
        .declare_kernel(&KernelSpec::new(
            "copy",
            "copy_values",
            WorkSize::one_d(LEN),
            vec![ArgSlot::Buffer, ArgSlot::Buffer],
        ))
        .await
        .unwrap();
    Some(pipeline)
}

#[test]
fn value_bindings_persist_until_rebound() {
    pollster::block_on(async {
        let Some(mut pipeline) = pipeline().await else {
            return;
        };
        pipeline.write("a", &vec![0u32; LEN as usize]).unwrap();
        pipeline.bind("add", 0, KernelArg::buffer("a")).unwrap();
        pipeline.bind("add", 1, KernelArg::value(&3u32)).unwrap();

        pipeline.dispatch("add", 4).unwrap();
        pipeline.bind_value("add", 1, &1u32).unwrap();
        pipeline.dispatch("add", 1).unwrap();
        pipeline.flush().unwrap();

        let data: Vec<u32> = pipeline.read("a").await.unwrap();
        assert!(data.iter().all(|&v| v == 13), "got {:?}", &data[..4]);

        let counts = pipeline.dispatch_counts();
        assert_eq!(counts, vec![("add", 5), ("copy", 0)]);
    });
}

#[test]
fn swap_exchanges_storage_behind_names() {
    pollster::block_on(async {
        let Some(mut pipeline) = pipeline().await else {
            return;
        };
        pipeline.write("a", &vec![1u32; LEN as usize]).unwrap();
        pipeline.write("b", &vec![2u32; LEN as usize]).unwrap();
        pipeline.bind_buffer("copy", 0, "a").unwrap();
        pipeline.bind_buffer("copy", 1, "c").unwrap();

        pipeline.dispatch("copy", 1).unwrap();
        let first: Vec<u32> = pipeline.read("c").await.unwrap();
        assert!(first.iter().all(|&v| v == 1));

        pipeline.swap("a", "b").unwrap();
        pipeline.dispatch("copy", 1).unwrap();
        let second: Vec<u32> = pipeline.read("c").await.unwrap();
        assert!(second.iter().all(|&v| v == 2));

        let a: Vec<u32> = pipeline.read("a").await.unwrap();
        let b: Vec<u32> = pipeline.read("b").await.unwrap();
        assert!(a.iter().all(|&v| v == 2));
        assert!(b.iter().all(|&v| v == 1));
    });
}

#[test]
fn read_into_fills_host_slice() {
    pollster::block_on(async {
        let Some(mut pipeline) = pipeline().await else {
            return;
        };
        let data: Vec<u32> = (0..LEN).collect();
        pipeline.write("b", &data).unwrap();

        let mut out = vec![0u32; LEN as usize];
        pipeline.read_into("b", &mut out).await.unwrap();
        assert_eq!(out, data);

        let mut short = vec![0u32; 3];
        let err = pipeline.read_into("b", &mut short).await.unwrap_err();
        assert!(matches!(err, GpuError::SizeMismatch { .. }));
    });
}

#[test]
fn unknown_names_are_rejected() {
    pollster::block_on(async {
        let Some(mut pipeline) = pipeline().await else {
            return;
        };
        let err = pipeline.dispatch("missing", 1).unwrap_err();
        assert!(matches!(err, GpuError::UnknownKernel(ref name) if name == "missing"));
        assert!(err.is_configuration());

        let err = pipeline.bind_buffer("add", 0, "nope").unwrap_err();
        assert!(matches!(err, GpuError::UnknownBuffer(_)));

        let err = pipeline.swap("a", "nope").unwrap_err();
        assert!(matches!(err, GpuError::UnknownBuffer(_)));
    });
}

#[test]
fn dispatch_requires_every_slot_bound() {
    pollster::block_on(async {
        let Some(mut pipeline) = pipeline().await else {
            return;
        };
        pipeline.bind_buffer("copy", 1, "c").unwrap();
        match pipeline.dispatch("copy", 1).unwrap_err() {
            GpuError::UnboundArguments { kernel, unbound } => {
                assert_eq!(kernel, "copy");
                assert_eq!(unbound, vec![0]);
            }
            other => panic!("unexpected error: {other}"),
        }
    });
}

#[test]
fn argument_kinds_and_sizes_are_checked() {
    pollster::block_on(async {
        let Some(mut pipeline) = pipeline().await else {
            return;
        };
        let err = pipeline.bind_value("add", 1, &1u64).unwrap_err();
        assert!(matches!(err, GpuError::ArgumentSize { expected: 4, actual: 8, .. }));

        let err = pipeline.bind_value("copy", 0, &1u32).unwrap_err();
        assert!(matches!(err, GpuError::ArgumentKind { .. }));

        let err = pipeline.bind_buffer("add", 2, "a").unwrap_err();
        assert!(matches!(err, GpuError::ArgumentIndex { index: 2, .. }));

        let err = pipeline.write("a", &[0u32; 3]).unwrap_err();
        assert!(matches!(err, GpuError::SizeMismatch { .. }));
    });
}

#[test]
fn declarations_reject_duplicates_and_bad_programs() {
    pollster::block_on(async {
        let Some(mut pipeline) = pipeline().await else {
            return;
        };
        let err = pipeline.declare_buffer("a", 16).await.unwrap_err();
        assert!(matches!(err, GpuError::DuplicateName(_)));

        let GpuAvailability::Available(ctx) = GpuContext::try_init().await else {
            return;
        };
        let result = ComputePipeline::new(ctx, "broken", "fn main( {").await;
        match result {
            Err(GpuError::ProgramBuild { log }) => assert!(!log.is_empty()),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("broken program compiled"),
        }
    });
}
