/*
 * Utilities
 *
 * - log_ring: IRQ-safe ring-buffer backend for the `log` facade
 */

pub mod log_ring;
