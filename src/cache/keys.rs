/// 天气数据缓存键
pub fn weather_key(lookup_key: &str) -> String {
    format!("weather:{}", lookup_key)
}
