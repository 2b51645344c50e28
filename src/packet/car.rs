//! Car telemetry and car status decoding for the display path.
//!
//! Only two packet bodies are interpreted beyond the common header: Car
//! Telemetry (ID 6) and Car Status (ID 7), both fixed-stride per-car record
//! arrays indexed by the header's `player_car_index`. Everything decoded here
//! feeds the external display; capture and replay never depend on it.

use super::layout::PacketLayout;
use super::{CapturedPacket, PacketKind};

/// Player-car values from a Car Telemetry packet (ID 6).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CarTelemetry {
    pub speed_kmh: u16,
    /// 0.0 to 1.0.
    pub throttle: f32,
    /// 0.0 to 1.0.
    pub brake: f32,
    /// -1 = reverse, 0 = neutral, 1..8 = forward gears.
    pub gear: i8,
    pub engine_rpm: u16,
    pub drs_active: bool,
    pub engine_temp_c: u16,
    /// Surface temperatures: FL, FR, RL, RR.
    pub tyre_surface_temp_c: [u8; 4],
    pub tyre_pressure_psi: [f32; 4],
}

impl CarTelemetry {
    /// Decodes the player car's slice of a Car Telemetry packet.
    ///
    /// Returns `None` when the packet is not a Car Telemetry packet or the
    /// player-car record does not fit inside the payload.
    pub fn decode(packet: &CapturedPacket) -> Option<Self> {
        if packet.kind() != Some(PacketKind::CarTelemetry) {
            return None;
        }
        let layout = PacketLayout::for_format(packet.header.packet_format);
        let stride = layout.car_telemetry_stride;
        let base = layout.header_len + usize::from(packet.header.player_car_index) * stride;
        let record = packet.payload.get(base..base + stride)?;

        Some(Self {
            speed_kmh: u16_at(record, 0),
            throttle: f32_at(record, 2),
            // f32 steer at 6 is skipped
            brake: f32_at(record, 10),
            // u8 clutch at 14 is skipped
            gear: record[15] as i8,
            engine_rpm: u16_at(record, 16),
            drs_active: record[18] != 0,
            tyre_surface_temp_c: [record[30], record[31], record[32], record[33]],
            engine_temp_c: u16_at(record, 38),
            tyre_pressure_psi: [
                f32_at(record, 40),
                f32_at(record, 44),
                f32_at(record, 48),
                f32_at(record, 52),
            ],
        })
    }
}

/// Player-car values from a Car Status packet (ID 7).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CarStatus {
    pub fuel_in_tank_kg: f32,
    pub drs_allowed: bool,
    /// ERS battery charge in Joules (up to 4 MJ).
    pub ers_store_energy_j: f32,
    pub ers_deploy_mode: u8,
}

impl CarStatus {
    /// Decodes the player car's slice of a Car Status packet.
    pub fn decode(packet: &CapturedPacket) -> Option<Self> {
        if packet.kind() != Some(PacketKind::CarStatus) {
            return None;
        }
        let layout = PacketLayout::for_format(packet.header.packet_format);
        let stride = layout.car_status_stride;
        let base = layout.header_len + usize::from(packet.header.player_car_index) * stride;
        let record = packet.payload.get(base..base + stride)?;

        Some(Self {
            // tractionControl, antiLockBrakes, fuelMix, frontBrakeBias and
            // pitLimiterStatus occupy bytes 0..5
            fuel_in_tank_kg: f32_at(record, 5),
            drs_allowed: record[22] != 0,
            ers_store_energy_j: f32_at(record, 37),
            ers_deploy_mode: record[41],
        })
    }
}

/// Latest known car state, merged across packet kinds for the display.
///
/// Telemetry and status arrive in separate packets at different cadences; the
/// display folds each arriving packet into one snapshot and renders whatever
/// is most recent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DashboardSnapshot {
    pub telemetry: CarTelemetry,
    pub status: CarStatus,
}

impl DashboardSnapshot {
    /// Folds one captured packet into the snapshot.
    ///
    /// Returns `true` when the packet carried car data for the player car.
    pub fn update(&mut self, packet: &CapturedPacket) -> bool {
        if let Some(telemetry) = CarTelemetry::decode(packet) {
            self.telemetry = telemetry;
            return true;
        }
        if let Some(status) = CarStatus::decode(packet) {
            self.status = status;
            return true;
        }
        false
    }
}

fn u16_at(record: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([record[offset], record[offset + 1]])
}

fn f32_at(record: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([
        record[offset],
        record[offset + 1],
        record[offset + 2],
        record[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::HEADER_SIZE;

    fn header_bytes(packet_id: u8, player_car_index: u8) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[0..2].copy_from_slice(&2025u16.to_le_bytes());
        buf[6] = packet_id;
        buf[27] = player_car_index;
        buf
    }

    fn telemetry_packet(player_car_index: u8, cars: usize) -> CapturedPacket {
        let mut payload = header_bytes(6, player_car_index);
        for car in 0..cars {
            let mut record = vec![0u8; 60];
            record[0..2].copy_from_slice(&(280 + car as u16).to_le_bytes()); // speed
            record[2..6].copy_from_slice(&0.95f32.to_le_bytes()); // throttle
            record[10..14].copy_from_slice(&0.1f32.to_le_bytes()); // brake
            record[15] = 7; // gear
            record[16..18].copy_from_slice(&11_300u16.to_le_bytes()); // rpm
            record[18] = 1; // drs
            record[30..34].copy_from_slice(&[95, 96, 97, 98]); // surface temps
            record[38..40].copy_from_slice(&105u16.to_le_bytes()); // engine temp
            record[40..44].copy_from_slice(&22.5f32.to_le_bytes()); // pressure FL
            payload.extend_from_slice(&record);
        }
        CapturedPacket::new(0, payload).unwrap()
    }

    fn status_packet(player_car_index: u8, cars: usize) -> CapturedPacket {
        let mut payload = header_bytes(7, player_car_index);
        for _ in 0..cars {
            let mut record = vec![0u8; 58];
            record[5..9].copy_from_slice(&34.2f32.to_le_bytes()); // fuel
            record[22] = 1; // drs allowed
            record[37..41].copy_from_slice(&3_600_000.0f32.to_le_bytes()); // ers store
            record[41] = 2; // deploy mode
            payload.extend_from_slice(&record);
        }
        CapturedPacket::new(0, payload).unwrap()
    }

    #[test]
    fn decodes_player_car_telemetry() {
        let packet = telemetry_packet(1, 3);
        let telemetry = CarTelemetry::decode(&packet).unwrap();

        assert_eq!(telemetry.speed_kmh, 281); // index 1
        assert_eq!(telemetry.throttle, 0.95);
        assert_eq!(telemetry.brake, 0.1);
        assert_eq!(telemetry.gear, 7);
        assert_eq!(telemetry.engine_rpm, 11_300);
        assert!(telemetry.drs_active);
        assert_eq!(telemetry.tyre_surface_temp_c, [95, 96, 97, 98]);
        assert_eq!(telemetry.engine_temp_c, 105);
        assert_eq!(telemetry.tyre_pressure_psi[0], 22.5);
    }

    #[test]
    fn decodes_player_car_status() {
        let packet = status_packet(0, 2);
        let status = CarStatus::decode(&packet).unwrap();

        assert_eq!(status.fuel_in_tank_kg, 34.2);
        assert!(status.drs_allowed);
        assert_eq!(status.ers_store_energy_j, 3_600_000.0);
        assert_eq!(status.ers_deploy_mode, 2);
    }

    #[test]
    fn rejects_wrong_kind_and_short_payloads() {
        let telemetry = telemetry_packet(0, 2);
        assert!(CarStatus::decode(&telemetry).is_none());

        // Player index beyond the records actually present.
        let short = telemetry_packet(5, 2);
        assert!(CarTelemetry::decode(&short).is_none());
    }

    #[test]
    fn dashboard_merges_both_kinds() {
        let mut dash = DashboardSnapshot::default();
        assert!(dash.update(&telemetry_packet(0, 1)));
        assert!(dash.update(&status_packet(0, 1)));

        assert_eq!(dash.telemetry.speed_kmh, 280);
        assert_eq!(dash.status.ers_deploy_mode, 2);

        // Non-car packets leave the snapshot untouched.
        let mut other = header_bytes(3, 0);
        other.extend_from_slice(&[0u8; 16]);
        let event = CapturedPacket::new(0, other).unwrap();
        let before = dash;
        assert!(!dash.update(&event));
        assert_eq!(dash, before);
    }
}
