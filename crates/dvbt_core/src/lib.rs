pub mod bit_sink;
pub mod dvbt_parameters;
pub mod dvbt_pilot_prbs;
pub mod dvbt_tps_frame;
