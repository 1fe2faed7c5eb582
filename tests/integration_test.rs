use tempfile::NamedTempFile;
use tensorcask::pipeline::{CodecId, Dtype, PrevState};
use tensorcask::reader::Reader;
use tensorcask::workspace::Workspace;
use tensorcask::writer::{Writer, WriterOptions};

#[test]
fn appends_survive_a_round_trip_through_a_real_file() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let rows: Vec<f32> = (0..64).map(|i| i as f32 * 0.5).collect();
    let raw: Vec<u8> = rows.iter().flat_map(|x| x.to_le_bytes()).collect();

    {
        let mut writer = Writer::create_file(&path, WriterOptions::default()).unwrap();
        let mut state = PrevState::None;
        let mut workspace = Workspace::new();
        let encoded = tensorcask::pipeline::encode(
            CodecId::T1dF32XorShuffle,
            Dtype::F32,
            &[64],
            &raw,
            &mut state,
            &mut workspace,
            3,
        )
        .unwrap();
        let hash = tensorcask::hash::hash_bytes_256(&raw);
        writer
            .append_chunk(CodecId::T1dF32XorShuffle, Dtype::F32, 0, &[64], hash, encoded)
            .unwrap();
        writer.flush().unwrap();
    }

    {
        let mut reader = Reader::open_file(&path).unwrap();
        assert_eq!(reader.num_chunks(), 1);
        let record = reader.get_chunk(0).unwrap();
        assert_eq!(record.logical_shape(), &[64]);
        assert_eq!(record.hash, tensorcask::hash::hash_bytes_256(&raw));
    }
}

#[test]
fn reopening_an_existing_file_for_append_continues_the_index_chain() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    {
        let mut writer = Writer::create_file(&path, WriterOptions::default()).unwrap();
        let payload = vec![1u8, 2, 3, 4];
        let hash = tensorcask::hash::hash_bytes_256(&payload);
        writer.append_chunk(CodecId::Raw, Dtype::U8, 0, &[4], hash, payload).unwrap();
        writer.flush().unwrap();
    }
    {
        let mut writer = Writer::open_file_for_append(&path).unwrap();
        let payload = vec![5u8, 6, 7, 8];
        let hash = tensorcask::hash::hash_bytes_256(&payload);
        writer.append_chunk(CodecId::Raw, Dtype::U8, 0, &[4], hash, payload).unwrap();
        writer.flush().unwrap();
    }

    let mut reader = Reader::open_file(&path).unwrap();
    assert_eq!(reader.num_chunks(), 2);
    assert_eq!(reader.get_chunk(0).unwrap().payload, vec![1, 2, 3, 4]);
    assert_eq!(reader.get_chunk(1).unwrap().payload, vec![5, 6, 7, 8]);
}

#[test]
fn extractor_decodes_and_verifies_chunks_written_through_ops() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let data: Vec<f32> = (0..32).map(|i| i as f32).collect();
    let raw: Vec<u8> = data.iter().flat_map(|x| x.to_le_bytes()).collect();

    {
        let mut writer = Writer::create_file(&path, WriterOptions::default()).unwrap();
        let mut state = PrevState::None;
        let mut workspace = Workspace::new();
        tensorcask::ops::store_chunk(
            &mut writer,
            CodecId::T1dF32XorShuffle,
            Dtype::F32,
            &[32],
            &raw,
            &mut state,
            &mut workspace,
            3,
        )
        .unwrap();
        writer.flush().unwrap();
    }

    let reader = Reader::open_file(&path).unwrap();
    let mut extractor = tensorcask::extractor::Extractor::new(reader);
    let decoded = extractor.read_chunk(0).unwrap();
    assert_eq!(decoded, raw);
}
