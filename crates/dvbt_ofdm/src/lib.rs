pub mod dvbt_constellation_demux;
pub mod dvbt_equalizer;
pub mod dvbt_receiver;
pub mod dvbt_symbol_interleaver;
pub mod dvbt_tps_decoder;
