use tensorcask::pipeline::{self, CodecId, Dtype, PrevState};
use tensorcask::workspace::Workspace;

fn f32_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn i64_bytes(v: &[i64]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

#[test]
fn raw_codec_is_a_pure_passthrough() {
    let data = vec![9u8, 8, 7, 200, 255, 0, 1];
    let mut state = PrevState::None;
    let mut ws = Workspace::new();
    let encoded = pipeline::encode(CodecId::Raw, Dtype::U8, &[7], &data, &mut state, &mut ws, 3).unwrap();
    assert_eq!(encoded, data);
    let mut dec_state = PrevState::None;
    let mut dec_ws = Workspace::new();
    let decoded = pipeline::decode(CodecId::Raw, Dtype::U8, &[7], &encoded, &mut dec_state, &mut dec_ws).unwrap();
    assert_eq!(decoded, data);
}

#[test]
fn entropy_only_round_trips_and_shrinks_repetitive_data() {
    let data = vec![7u8; 4096];
    let mut state = PrevState::None;
    let mut ws = Workspace::new();
    let encoded = pipeline::encode(CodecId::EntropyOnly, Dtype::U8, &[4096], &data, &mut state, &mut ws, 3).unwrap();
    assert!(encoded.len() < data.len());
    let mut dec_state = PrevState::None;
    let mut dec_ws = Workspace::new();
    let decoded =
        pipeline::decode(CodecId::EntropyOnly, Dtype::U8, &[4096], &encoded, &mut dec_state, &mut dec_ws).unwrap();
    assert_eq!(decoded, data);
}

#[test]
fn t1d_f32_xor_shuffle_chains_across_consecutive_chunks() {
    let chunk1: Vec<f32> = (0..128).map(|i| (i as f32).sin()).collect();
    let chunk2: Vec<f32> = (0..128).map(|i| (i as f32).cos()).collect();

    let mut enc_state = PrevState::None;
    let mut ws = Workspace::new();
    let e1 = pipeline::encode(
        CodecId::T1dF32XorShuffle, Dtype::F32, &[128], &f32_bytes(&chunk1), &mut enc_state, &mut ws, 3,
    )
    .unwrap();
    let e2 = pipeline::encode(
        CodecId::T1dF32XorShuffle, Dtype::F32, &[128], &f32_bytes(&chunk2), &mut enc_state, &mut ws, 3,
    )
    .unwrap();

    let mut dec_state = PrevState::None;
    let mut dec_ws = Workspace::new();
    let d1 =
        pipeline::decode(CodecId::T1dF32XorShuffle, Dtype::F32, &[128], &e1, &mut dec_state, &mut dec_ws).unwrap();
    let d2 =
        pipeline::decode(CodecId::T1dF32XorShuffle, Dtype::F32, &[128], &e2, &mut dec_state, &mut dec_ws).unwrap();
    assert_eq!(d1, f32_bytes(&chunk1));
    assert_eq!(d2, f32_bytes(&chunk2));
}

#[test]
fn t1d_i64_delta_round_trips_a_monotonic_series() {
    let series: Vec<i64> = (0..500).map(|i| i * 17 - 3).collect();
    let raw = i64_bytes(&series);

    let mut enc_state = PrevState::None;
    let mut ws = Workspace::new();
    let encoded =
        pipeline::encode(CodecId::T1dI64Delta, Dtype::I64, &[500], &raw, &mut enc_state, &mut ws, 3).unwrap();
    assert!(encoded.len() < raw.len());

    let mut dec_state = PrevState::None;
    let mut dec_ws = Workspace::new();
    let decoded =
        pipeline::decode(CodecId::T1dI64Delta, Dtype::I64, &[500], &encoded, &mut dec_state, &mut dec_ws).unwrap();
    assert_eq!(decoded, raw);
}

#[test]
fn t2d_f32_round_trips_per_column_and_chains_across_chunks() {
    let rows = 20usize;
    let cols = 5u32;
    let frame1: Vec<f32> = (0..rows * cols as usize).map(|i| i as f32 * 0.25).collect();
    let frame2: Vec<f32> = (0..rows * cols as usize).map(|i| i as f32 * 0.25 + 1.0).collect();

    let mut enc_state = PrevState::None;
    let mut ws = Workspace::new();
    let shape = [rows as u32, cols];
    let e1 =
        pipeline::encode(CodecId::T2dF32, Dtype::F32, &shape, &f32_bytes(&frame1), &mut enc_state, &mut ws, 3)
            .unwrap();
    let e2 =
        pipeline::encode(CodecId::T2dF32, Dtype::F32, &shape, &f32_bytes(&frame2), &mut enc_state, &mut ws, 3)
            .unwrap();

    let mut dec_state = PrevState::None;
    let mut dec_ws = Workspace::new();
    let d1 = pipeline::decode(CodecId::T2dF32, Dtype::F32, &shape, &e1, &mut dec_state, &mut dec_ws).unwrap();
    let d2 = pipeline::decode(CodecId::T2dF32, Dtype::F32, &shape, &e2, &mut dec_state, &mut dec_ws).unwrap();
    assert_eq!(d1, f32_bytes(&frame1));
    assert_eq!(d2, f32_bytes(&frame2));
}

/// S4: encode 100 order-book snapshots through the f16-demoted codec; the
/// decoded stream must match the f32 input to within the precision f16
/// itself loses (not bit-exact), and the compressed form must beat raw f32.
#[test]
fn ob_okx_f16_from_f32_loses_only_f16_precision_and_compresses() {
    let snapshots = 100usize;
    let depth = 50u32;
    let features = 3u32;
    let elems = snapshots * depth as usize * features as usize;
    let data: Vec<f32> = (0..elems).map(|i| (i as f32 * 0.01).sin() * 1000.0).collect();
    let raw = f32_bytes(&data);
    let shape = [snapshots as u32, depth, features];

    let mut enc_state = PrevState::None;
    let mut ws = Workspace::new();
    let encoded =
        pipeline::encode(CodecId::ObOkxF16, Dtype::F32, &shape, &raw, &mut enc_state, &mut ws, 3).unwrap();
    assert!(encoded.len() < raw.len());

    let mut dec_state = PrevState::None;
    let mut dec_ws = Workspace::new();
    let decoded =
        pipeline::decode(CodecId::ObOkxF16, Dtype::F32, &shape, &encoded, &mut dec_state, &mut dec_ws).unwrap();
    assert_eq!(decoded.len(), raw.len());

    for (original, roundtripped) in data.iter().zip(decoded.chunks_exact(4)) {
        let got = f32::from_le_bytes(roundtripped.try_into().unwrap());
        let demoted_exactly = half::f16::from_f32(*original).to_f32();
        assert_eq!(got, demoted_exactly);
    }
}

#[test]
fn unknown_codec_and_dtype_tags_are_rejected() {
    assert!(CodecId::from_u16(9999).is_err());
    assert!(Dtype::from_u16(9999).is_err());
}
