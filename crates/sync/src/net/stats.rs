#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub connect_attempts: u64,
    pub reconnects_scheduled: u64,
    pub rtt_ms: Option<f32>,
}
