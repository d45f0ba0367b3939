fn main() {
    radar_object_count::cli::run();
}
