use liblmf_io::constants::*;
use liblmf_io::daq::DaqId;
use liblmf_io::error::LmfError;
use liblmf_io::output::OutputSettings;
use liblmf_io::session::LmfIo;

fn hm1_settings() -> OutputSettings {
    OutputSettings {
        daq_id: Some(DaqId::Hm1),
        daq_version: Some(DAQ_VERSION_20110208),
        lmf_version: Some(9),
        timestamp_format: Some(1),
        number_of_channels: Some(1),
        max_number_of_hits: Some(1),
        resolution: Some(0.5),
        comment: Some("beam on".to_string()),
        ..Default::default()
    }
}

#[test]
fn test_sticky_error_codes() {
    let dir = tempfile::tempdir().unwrap();
    let mut lmf = LmfIo::new(1, 1);

    assert!(matches!(lmf.read_next_event(), Err(LmfError::InputNotOpen)));
    assert_eq!(lmf.error_status(), 7);
    assert_eq!(lmf.write_raw32_words(&[1]).unwrap_err().code(), 8);
    assert_eq!(lmf.close_output_lmf().unwrap_err().code(), 8);
    // Still set after an unrelated successful call
    assert_eq!(lmf.number_of_events(), 0);
    assert_eq!(lmf.error_status(), 8);
    lmf.clear_error();
    assert_eq!(lmf.error_status(), 0);

    let missing = dir.path().join("missing.lmf");
    assert_eq!(lmf.open_input_lmf(&missing).unwrap_err().code(), 4);

    let path = dir.path().join("hm1.lmf");
    *lmf.output_mut() = hm1_settings();
    lmf.open_output_lmf(&path).unwrap();
    assert_eq!(lmf.error_status(), 0);
    assert_eq!(lmf.open_output_lmf(&path).unwrap_err().code(), 10);
    lmf.close_output_lmf().unwrap();

    lmf.open_input_lmf(&path).unwrap();
    assert_eq!(lmf.open_input_lmf(&path).unwrap_err().code(), 3);
    assert_eq!(lmf.error_status(), 3);
    lmf.close_input_lmf().unwrap();
    assert_eq!(lmf.close_input_lmf().unwrap_err().code(), 7);
}

#[test]
fn test_drop_finishes_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dropped.lmf");
    {
        let mut lmf = LmfIo::new(1, 1);
        *lmf.output_mut() = hm1_settings();
        lmf.open_output_lmf(&path).unwrap();
        for timestamp in 0..4 {
            lmf.write_tdc_data_i32(timestamp, &[1], &[timestamp as i32])
                .unwrap();
        }
    }

    let mut lmf = LmfIo::new(1, 1);
    lmf.open_input_lmf(&path).unwrap();
    assert_eq!(lmf.number_of_events(), 4);
    let headers = lmf.input_headers().unwrap();
    assert_eq!(headers.file.comment, "beam on");
    assert_eq!(headers.file.daq_version, DAQ_VERSION_20110208);
    let mut read = 0;
    while lmf.read_next_event().unwrap() {
        assert_eq!(lmf.hits(0).to_vec(), vec![read]);
        read += 1;
    }
    assert_eq!(read, 4);
    assert_eq!(lmf.events_read(), 4);
}

#[test]
fn test_convert_through_clone() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.lmf");
    let converted = dir.path().join("converted.lmf");
    {
        let mut lmf = LmfIo::new(2, 2);
        *lmf.output_mut() = hm1_settings();
        lmf.open_output_lmf(&source).unwrap();
        lmf.write_tdc_data_i32(10, &[1], &[-3, 0]).unwrap();
        lmf.write_tdc_data_i32(20, &[0], &[0, 0]).unwrap();
        lmf.close_output_lmf().unwrap();
    }

    let mut reader = LmfIo::new(2, 2);
    reader.open_input_lmf(&source).unwrap();
    assert_eq!(reader.daq_id(), Some(DaqId::Hm1));
    let mut writer = reader.clone_session();
    assert_eq!(writer.daq_id(), Some(DaqId::Hm1));
    assert_eq!(writer.events_read(), 0);
    // Only the DAQ changes, everything else comes from the input headers
    writer.output_mut().daq_id = Some(DaqId::DualHm1);
    writer.output_mut().data_format = Some(LM_DOUBLE);
    writer.open_output_lmf(&converted).unwrap();
    let (header, variant) = writer.output_headers().unwrap();
    assert_eq!(header.comment, "beam on");
    assert_eq!(variant.common().resolution, 0.5);

    let mut counts = [0u32; 2];
    let mut data = [0i32; 4];
    while reader.read_next_event().unwrap() {
        reader.number_of_hits_array(&mut counts);
        reader.tdc_data_i32(&mut data).unwrap();
        writer
            .write_tdc_data_i32(reader.u64_timestamp(), &counts, &data)
            .unwrap();
    }
    writer.close_output_lmf().unwrap();

    let mut lmf = LmfIo::new(2, 2);
    lmf.open_input_lmf(&converted).unwrap();
    assert_eq!(lmf.daq_id(), Some(DaqId::DualHm1));
    assert_eq!(lmf.number_of_events(), 2);
    assert!(lmf.read_next_event().unwrap());
    assert_eq!(lmf.u64_timestamp(), 10);
    assert_eq!(lmf.hit_doubles(0).to_vec(), vec![-3.0]);
    assert!(lmf.read_next_event().unwrap());
    assert_eq!(lmf.u64_timestamp(), 20);
    assert!(lmf.hits(0).is_empty());
}
