use std::path::Path;

use liblmf_io::constants::*;
use liblmf_io::daq::{ArchiveEra, DaqId};
use liblmf_io::output::OutputSettings;
use liblmf_io::session::LmfIo;

fn tdc_settings(daq_id: DaqId) -> OutputSettings {
    OutputSettings {
        daq_id: Some(daq_id),
        daq_version: Some(DAQ_VERSION_20110208),
        lmf_version: Some(9),
        timestamp_format: Some(2),
        number_of_channels: Some(2),
        max_number_of_hits: Some(3),
        frequency: Some(1.0e9),
        resolution: Some(0.025),
        ..Default::default()
    }
}

/// Five events: channel 0 holds the event number times ten, channel 1 two fixed hits
fn write_events(path: &Path, settings: OutputSettings) {
    let mut lmf = LmfIo::new(4, 4);
    *lmf.output_mut() = settings;
    lmf.open_output_lmf(path).unwrap();
    for event in 0..5 {
        let counts = [1u32, 2];
        let data = [event * 10, 0, 0, 0, 7, 8, 0, 0];
        lmf.write_tdc_data_i32(event as u64 * 100, &counts, &data)
            .unwrap();
    }
    assert_eq!(lmf.events_written(), 5);
    lmf.close_output_lmf().unwrap();
}

fn check_events(path: &Path, daq_id: DaqId) {
    let mut lmf = LmfIo::new(4, 4);
    lmf.open_input_lmf(path).unwrap();
    assert_eq!(lmf.daq_id(), Some(daq_id));
    assert_eq!(lmf.number_of_events(), 5);
    assert_eq!(lmf.number_of_channels(), 2);
    assert_eq!(lmf.max_number_of_hits(), 3);
    assert_eq!(lmf.tdc_resolution(), 0.025);
    let mut counts = [0u32; 4];
    let mut data = [0i32; 16];
    for event in 0..5 {
        assert!(lmf.read_next_event().unwrap(), "{daq_id} event {event}");
        assert_eq!(lmf.u64_timestamp(), event as u64 * 100);
        assert_eq!(lmf.double_timestamp(), event as f64 * 100.0 / 1.0e9);
        lmf.number_of_hits_array(&mut counts);
        assert_eq!(counts, [1, 2, 0, 0]);
        lmf.tdc_data_i32(&mut data).unwrap();
        assert_eq!(&data[0..8], &[event * 10, 0, 0, 0, 7, 8, 0, 0]);
    }
    assert!(!lmf.read_next_event().unwrap());
    assert_eq!(lmf.error_status(), 15);
}

#[test]
fn test_fixed_record_kinds() {
    let dir = tempfile::tempdir().unwrap();
    for daq_id in [
        DaqId::Tdc8,
        DaqId::DualTdc8,
        DaqId::Hm1,
        DaqId::Hm1Abm,
        DaqId::DualHm1,
        DaqId::Tcpip,
        DaqId::Tdc8hp,
    ] {
        let path = dir.path().join(format!("{}.lmf", daq_id.code()));
        write_events(&path, tdc_settings(daq_id));
        check_events(&path, daq_id);
    }
}

#[test]
fn test_padded_tdc8hp_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tdc8hp.lmf");
    write_events(&path, tdc_settings(DaqId::Tdc8hp));
    let (header_size, user_header_size) = {
        let mut lmf = LmfIo::new(4, 4);
        lmf.open_input_lmf(&path).unwrap();
        let file = &lmf.input_headers().unwrap().file;
        assert_eq!(file.era, ArchiveEra::Era2008);
        (file.header_size, file.user_header_size)
    };

    // Sixteen zero bytes behind the user header, declared in both size fields
    let bytes = std::fs::read(&path).unwrap();
    let events_start = (header_size + user_header_size) as usize;
    let padded_size = (user_header_size + 16).to_le_bytes();
    let mut padded = bytes[..events_start].to_vec();
    padded.extend_from_slice(&[0u8; 16]);
    padded.extend_from_slice(&bytes[events_start..]);
    padded[24..32].copy_from_slice(&padded_size);
    let preamble = header_size as usize + 4;
    padded[preamble..preamble + 8].copy_from_slice(&padded_size);
    let padded_path = dir.path().join("padded.lmf");
    std::fs::write(&padded_path, padded).unwrap();

    check_events(&padded_path, DaqId::Tdc8hp);
    let mut lmf = LmfIo::new(4, 4);
    lmf.open_input_lmf(&padded_path).unwrap();
    assert_eq!(
        lmf.input_headers().unwrap().file.user_header_size,
        user_header_size + 16
    );
    lmf.seek_to_event_number(2).unwrap();
    assert!(lmf.read_next_event().unwrap());
    assert_eq!(lmf.u64_timestamp(), 200);
}

#[test]
fn test_data_formats_and_eras() {
    let dir = tempfile::tempdir().unwrap();
    let short = dir.path().join("short.lmf");
    write_events(
        &short,
        OutputSettings {
            data_format: Some(LM_SHORT),
            era: Some(ArchiveEra::Era2002),
            ..tdc_settings(DaqId::Tdc8)
        },
    );
    check_events(&short, DaqId::Tdc8);

    let double = dir.path().join("double.lmf");
    write_events(
        &double,
        OutputSettings {
            data_format: Some(LM_DOUBLE),
            daq_version: Some(DAQ_VERSION_2002),
            ..tdc_settings(DaqId::Hm1)
        },
    );
    check_events(&double, DaqId::Hm1);
}

#[test]
fn test_variable_records_with_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("variable.lmf");
    let settings = OutputSettings {
        lmf_version: Some(10),
        variable_event_length: Some(1),
        number_of_channels: Some(1),
        ..tdc_settings(DaqId::Tdc8hp)
    };

    let mut lmf = LmfIo::new(4, 4);
    *lmf.output_mut() = settings;
    lmf.open_output_lmf(&path).unwrap();
    lmf.write_tdc_data_i32(1, &[0], &[]).unwrap();
    assert!(lmf.set_parameter(905, 2.5));
    lmf.write_tdc_data_i32(2, &[0], &[]).unwrap();
    lmf.set_post_event_data(b"abc").unwrap();
    lmf.write_tdc_data_i32(3, &[2], &[-4, 9]).unwrap();
    lmf.close_output_lmf().unwrap();

    let mut lmf = LmfIo::new(4, 4);
    lmf.open_input_lmf(&path).unwrap();
    let events_start = lmf.input_headers().unwrap().file.events_start();
    // marker, counter, timestamp, one u16 count, mask, post-event size
    let empty_record = 8 + 8 + 8 + 2 + 4 + 4;
    let file_size = std::fs::metadata(&path).unwrap().len();
    // Only parameter 905 changed: one extra double in the second record
    assert_eq!(
        file_size,
        events_start + 3 * empty_record + 8 + 3 + 2 * 4
    );

    assert!(lmf.read_next_event().unwrap());
    assert_eq!(lmf.parameter(905), Some(0.0));
    assert!(lmf.read_next_event().unwrap());
    assert_eq!(lmf.event_counter(), 1);
    assert_eq!(lmf.parameter(905), Some(2.5));
    assert!(lmf.read_next_event().unwrap());
    assert_eq!(lmf.post_event_data(), b"abc");
    assert_eq!(lmf.hits(0).to_vec(), vec![-4, 9]);
    assert!(!lmf.read_next_event().unwrap());

    // Variable length records cannot be seeked
    let err = lmf.seek_to_event_number(1).unwrap_err();
    assert_eq!(err.code(), 13);
    assert_eq!(lmf.error_status(), 13);
}

#[test]
fn test_post_event_data_limit() {
    let mut lmf = LmfIo::new(1, 1);
    let data = vec![0u8; MAX_POST_EVENT_DATA + 1];
    assert_eq!(lmf.set_post_event_data(&data).unwrap_err().code(), 18);
    assert!(lmf.set_post_event_data(&data[1..]).is_ok());
}

#[test]
fn test_seek_fixed_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seek.lmf");
    write_events(&path, tdc_settings(DaqId::Tdc8));

    let mut lmf = LmfIo::new(4, 4);
    lmf.open_input_lmf(&path).unwrap();
    lmf.seek_to_event_number(3).unwrap();
    assert!(lmf.read_next_event().unwrap());
    assert_eq!(lmf.u64_timestamp(), 300);
    lmf.seek_to_event_number(0).unwrap();
    assert!(lmf.read_next_event().unwrap());
    assert_eq!(lmf.u64_timestamp(), 0);
    assert_eq!(lmf.seek_to_event_number(5).unwrap_err().code(), 15);
    assert_eq!(lmf.seek_to_event_number(u64::MAX / 2).unwrap_err().code(), 15);
    assert_eq!(lmf.seek_to_event_number(u64::MAX).unwrap_err().code(), 15);
    lmf.seek_to_event_number(4).unwrap();
    assert!(lmf.read_next_event().unwrap());
    assert_eq!(lmf.u64_timestamp(), 400);
}

#[test]
fn test_camac_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("camac.lmf");
    let mut lmf = LmfIo::new(4, 4);
    *lmf.output_mut() = OutputSettings {
        daq_id: Some(DaqId::Camac),
        daq_version: Some(DAQ_VERSION_20110208),
        timestamp_format: Some(1),
        number_of_channels: Some(3),
        ..Default::default()
    };
    lmf.open_output_lmf(&path).unwrap();
    assert_eq!(
        lmf.write_tdc_data_i32(0, &[1], &[1]).unwrap_err().code(),
        12
    );
    lmf.write_camac_array(17, &[1, 2, 3]).unwrap();
    lmf.write_camac_array(18, &[4]).unwrap();
    lmf.close_output_lmf().unwrap();

    let mut lmf = LmfIo::new(4, 4);
    lmf.open_input_lmf(&path).unwrap();
    assert_eq!(lmf.input_headers().unwrap().file.number_of_coordinates, 3);
    assert!(lmf.read_next_event().unwrap());
    assert_eq!(lmf.u64_timestamp(), 17);
    assert_eq!(lmf.camac_array().unwrap(), &[1, 2, 3]);
    let mut data = [0i32; 16];
    assert_eq!(lmf.tdc_data_i32(&mut data).unwrap_err().code(), 12);
    assert!(lmf.read_next_event().unwrap());
    assert_eq!(lmf.camac_array().unwrap(), &[4, 0, 0]);
    assert!(!lmf.read_next_event().unwrap());
}

#[test]
fn test_non_cobold_files() {
    let dir = tempfile::tempdir().unwrap();
    let simple = dir.path().join("simple.lmf");
    let mut lmf = LmfIo::new(2, 2);
    *lmf.output_mut() = OutputSettings {
        daq_id: Some(DaqId::Simple),
        number_of_channels: Some(2),
        max_number_of_hits: Some(2),
        ..Default::default()
    };
    lmf.open_output_lmf(&simple).unwrap();
    lmf.write_tdc_data_i32(0, &[2, 1], &[5, 6, 7, 0]).unwrap();
    lmf.close_output_lmf().unwrap();
    assert_eq!(
        std::fs::metadata(&simple).unwrap().len(),
        NON_COBOLD_HEADER_SIZE + 2 * 3 * 4
    );

    let mut lmf = LmfIo::new(2, 2);
    lmf.open_input_lmf(&simple).unwrap();
    assert!(lmf.read_next_event().unwrap());
    assert_eq!(lmf.hits(0).to_vec(), vec![5, 6]);
    assert_eq!(lmf.hits(1).to_vec(), vec![7]);
    assert!(!lmf.read_next_event().unwrap());
    // No declared event count, the offset itself runs out of range
    assert_eq!(lmf.seek_to_event_number(u64::MAX).unwrap_err().code(), 15);
    lmf.seek_to_event_number(0).unwrap();
    assert!(lmf.read_next_event().unwrap());
    assert_eq!(lmf.hits(0).to_vec(), vec![5, 6]);

    let raw = dir.path().join("raw32.lmf");
    let mut lmf = LmfIo::new(2, 2);
    *lmf.output_mut() = OutputSettings {
        daq_id: Some(DaqId::Raw32Bit),
        number_of_channels: Some(0),
        max_number_of_hits: Some(0),
        ..Default::default()
    };
    lmf.open_output_lmf(&raw).unwrap();
    lmf.write_raw32_words(&[0xDEAD_BEEF, 1]).unwrap();
    lmf.write_raw32_words(&[]).unwrap();
    lmf.close_output_lmf().unwrap();

    let mut lmf = LmfIo::new(2, 2);
    lmf.open_input_lmf(&raw).unwrap();
    assert!(lmf.read_next_event().unwrap());
    assert_eq!(lmf.raw32_words(), &[0xDEAD_BEEF, 1]);
    assert!(lmf.read_next_event().unwrap());
    assert!(lmf.raw32_words().is_empty());
    assert!(!lmf.read_next_event().unwrap());
}

#[test]
fn test_group_mode_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("group.lmf");
    let mut lmf = LmfIo::new(40, 4);
    *lmf.output_mut() = OutputSettings {
        daq_id: Some(DaqId::Tdc8hpRaw),
        daq_version: Some(DAQ_VERSION_20110208),
        lmf_version: Some(10),
        number_of_channels: Some(35),
        max_number_of_hits: Some(4),
        resolution: Some(0.025),
        ..Default::default()
    };
    lmf.open_output_lmf(&path).unwrap();
    lmf.write_raw_group_words(&[0x1000_0001, 0x0000_0020, 0xC100_0005, 0x8100_0009])
        .unwrap();
    lmf.write_raw_group_words(&[0x1000_0000, 0x0000_0010, 0xEF00_0001])
        .unwrap();
    lmf.close_output_lmf().unwrap();

    let mut lmf = LmfIo::new(40, 4);
    lmf.open_input_lmf(&path).unwrap();
    assert!(lmf.read_next_event().unwrap());
    assert_eq!(lmf.u64_timestamp(), (1 << 24) + 0x20);
    assert_eq!(lmf.hits(1).to_vec(), vec![5, 9]);
    assert_eq!(lmf.is_falling(1, 0), Some(false));
    assert_eq!(lmf.is_falling(1, 1), Some(true));
    assert!(lmf.read_next_event().unwrap());
    // The rollover counter wrapped through zero
    assert_eq!(lmf.u64_timestamp(), (1 + (1 << 24) - 1) * (1 << 24) + 0x10);
    assert_eq!(lmf.hits(34).to_vec(), vec![1]);
    assert!(!lmf.read_next_event().unwrap());
}
