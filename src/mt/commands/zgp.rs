//! `ZGP` subsystem: no commands in this driver's catalog reach it.
