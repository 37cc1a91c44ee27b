mod blackstart;
mod frequency;
mod pf;
mod realtime;
mod scenario;
