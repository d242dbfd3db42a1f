pub mod lsf;
pub mod pbs;
pub mod sge;
pub mod slurm;
