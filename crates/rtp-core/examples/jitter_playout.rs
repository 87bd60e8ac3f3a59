//! Feed a jitter buffer an out-of-order, lossy packet stream and play
//! it back, printing the reception statistics at the end.
//!
//! Run with: cargo run --example jitter_playout

use mediagw_rtp_core::{
    ClockSample, JitterBuffer, JitterBufferConfig, MemberStatistics, RtpPacketView,
};

const RATE: u32 = 8000;
const SSRC: u32 = 0x1234_5678;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("mediagw_rtp_core=debug")
        .init();

    let mut buffer = JitterBuffer::new(JitterBufferConfig {
        clock_rate: RATE,
        playout_delay_ms: 60,
        ..Default::default()
    });
    let mut stats = MemberStatistics::new(SSRC);

    // 20ms G.711 frames: sequence 4 is lost, 6 and 7 arrive swapped,
    // and arrival times wander around the ideal 20ms cadence
    let deliveries: &[(u16, u64)] = &[
        (1, 0),
        (2, 21),
        (3, 48),
        (5, 95),
        (7, 131),
        (6, 133),
        (8, 160),
    ];

    for &(seq, arrival_ms) in deliveries {
        let arrival = ClockSample::new(arrival_ms * (RATE as u64) / 1000, RATE);
        let packet = RtpPacketView {
            sequence_number: seq,
            timestamp: seq as u32 * 160,
            ssrc: SSRC,
            payload_type: 0,
            marker: false,
            payload: &[0u8; 160],
        };
        buffer.write(&packet, arrival);
        stats.on_receive_rtp(&packet, arrival);
    }

    // Drive playout well past the last arrival plus the playout delay
    let mut now = ClockSample::new(0, RATE);
    while let Some(frame) = buffer.read(now.plus_ticks(4000)) {
        println!(
            "play seq={:3} ts={:5} ({} bytes)",
            frame.sequence_number,
            frame.timestamp,
            frame.payload.len()
        );
        now = now.plus_ticks(frame.duration_ticks as u64);
    }

    let buffer_stats = buffer.stats();
    println!();
    println!("frames played:  {}", buffer_stats.frames_played);
    println!("discontinuities: {}", buffer_stats.discontinuities);
    println!("jitter estimate: {} ticks", buffer.get_estimated_jitter());

    let block = stats.report_block(ClockSample::new(4000, RATE));
    println!();
    println!("report block for {:#010x}:", block.ssrc);
    println!("  cumulative lost: {}", block.cumulative_lost);
    println!("  fraction lost:   {}/256", block.fraction_lost);
    println!("  ext highest seq: {}", block.extended_highest_sequence);
    println!("  jitter:          {}", block.interarrival_jitter);
}
