pub mod episode;
pub mod mdp;
pub mod mdp_simulator;
pub mod policy;
pub mod solvers;
pub mod value_table;
